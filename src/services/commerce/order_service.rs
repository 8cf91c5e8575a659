use crate::{
    config::AppConfig,
    db::{with_storage_timeout, DbPool},
    entities::commerce::{
        order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus,
        PaymentMethod, PaymentStatus,
    },
    errors::{ErrorCode, ServiceError},
    events::{Event, EventSender},
    services::commerce::order_status::{apply_transition, check_transition, Actor},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusInput {
    #[serde(alias = "paymentStatus")]
    pub payment_status: PaymentStatus,
}

/// Frozen line item as returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl From<OrderItemModel> for OrderLineView {
    fn from(item: OrderItemModel) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            product_image: item.product_image,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
            color: item.color,
            size: item.size,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub items: Vec<OrderLineView>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    pub voucher_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderView {
    pub fn new(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            address_id: order.address_id,
            items: items.into_iter().map(OrderLineView::from).collect(),
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            discount: order.discount,
            tax: order.tax,
            total_price: order.total_price,
            voucher_id: order.voucher_id,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            status: order.status,
            notes: order.notes,
            created_at: order.created_at,
            updated_at: order.updated_at,
            completed_at: order.completed_at,
        }
    }
}

/// Reads and status changes for persisted orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Customer's own orders, newest first. Returns the page and total count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: OrderListQuery,
    ) -> Result<(Vec<OrderView>, u64), ServiceError> {
        self.list(Some(user_id), query).await
    }

    /// Admin listing across all users
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self, query: OrderListQuery) -> Result<(Vec<OrderView>, u64), ServiceError> {
        self.list(None, query).await
    }

    /// An order visible to `user_id`; other users' orders are reported as missing
    #[instrument(skip(self))]
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        with_storage_timeout(self.config.storage_timeout(), async {
            let order = self.find_owned(user_id, order_id).await?;
            let items = load_items(&*self.db, order.id).await?;
            Ok(OrderView::new(order, items))
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_order_admin(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        with_storage_timeout(self.config.storage_timeout(), async {
            let order = self.find(order_id).await?;
            let items = load_items(&*self.db, order.id).await?;
            Ok(OrderView::new(order, items))
        })
        .await
    }

    /// Customer cancellation
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        self.update_status(order_id, OrderStatus::Cancelled, Actor::Customer, user_id)
            .await
    }

    /// Moves an order through the state machine on behalf of `actor`.
    ///
    /// Customers only see their own orders. The write is guarded by the
    /// order's version, so a concurrent change surfaces as a conflict.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Actor,
        requested_by: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let updated = with_storage_timeout(self.config.storage_timeout(), async {
            let current = match actor {
                Actor::Customer => self.find_owned(requested_by, order_id).await?,
                Actor::Admin => self.find(order_id).await?,
            };

            if let Err(err) = check_transition(current.status, target, actor) {
                warn!(%order_id, from = %current.status, to = %target, ?actor, "Rejected status change");
                return Err(err);
            }

            let previous = current.status;
            let version = current.version;
            let active = apply_transition(current, target, Utc::now());

            let updated = Order::update(active)
                .filter(order::Column::Version.eq(version))
                .exec(&*self.db)
                .await
                .map_err(|err| match err {
                    DbErr::RecordNotUpdated => ServiceError::conflict(
                        ErrorCode::Conflict,
                        format!("Order {} was modified concurrently, retry", order_id),
                    ),
                    other => other.into(),
                })?;

            let items = load_items(&*self.db, updated.id).await?;
            Ok((previous, OrderView::new(updated, items)))
        })
        .await;

        let (previous, view) = updated?;

        info!(
            order_number = %view.order_number,
            from = %previous,
            to = %view.status,
            ?actor,
            "Order status updated"
        );
        if previous == view.status {
            return Ok(view);
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: previous.to_string(),
                new_status: view.status.to_string(),
            })
            .await;
        if view.status == OrderStatus::Cancelled {
            self.event_sender
                .send_or_log(Event::OrderCancelled(order_id))
                .await;
        }

        Ok(view)
    }

    /// Admin: records a payment status reported by the payment provider
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<OrderView, ServiceError> {
        with_storage_timeout(self.config.storage_timeout(), async {
            let current = self.find(order_id).await?;
            let version = current.version;

            let mut active: order::ActiveModel = current.into();
            active.payment_status = Set(payment_status);
            active.updated_at = Set(Utc::now());
            active.version = Set(version + 1);

            let updated = Order::update(active)
                .filter(order::Column::Version.eq(version))
                .exec(&*self.db)
                .await
                .map_err(|err| match err {
                    DbErr::RecordNotUpdated => ServiceError::conflict(
                        ErrorCode::Conflict,
                        format!("Order {} was modified concurrently, retry", order_id),
                    ),
                    other => other.into(),
                })?;

            info!(order_number = %updated.order_number, %payment_status, "Payment status updated");
            let items = load_items(&*self.db, updated.id).await?;
            Ok(OrderView::new(updated, items))
        })
        .await
    }

    async fn list(
        &self,
        user_id: Option<Uuid>,
        query: OrderListQuery,
    ) -> Result<(Vec<OrderView>, u64), ServiceError> {
        let limit = self.config.page_size(query.limit);
        let page = query.page.unwrap_or(1).max(1);

        with_storage_timeout(self.config.storage_timeout(), async {
            let mut select = Order::find();
            if let Some(user_id) = user_id {
                select = select.filter(order::Column::UserId.eq(user_id));
            }
            if let Some(status) = query.status {
                select = select.filter(order::Column::Status.eq(status));
            }

            let paginator = select
                .order_by_desc(order::Column::CreatedAt)
                .order_by_desc(order::Column::OrderNumber)
                .paginate(&*self.db, limit);

            let total = paginator.num_items().await?;
            let orders = paginator.fetch_page(page - 1).await?;

            let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
            let mut items_by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
            if !ids.is_empty() {
                for item in OrderItem::find()
                    .filter(order_item::Column::OrderId.is_in(ids))
                    .order_by_asc(order_item::Column::Position)
                    .all(&*self.db)
                    .await?
                {
                    items_by_order.entry(item.order_id).or_default().push(item);
                }
            }

            let views = orders
                .into_iter()
                .map(|o| {
                    let items = items_by_order.remove(&o.id).unwrap_or_default();
                    OrderView::new(o, items)
                })
                .collect();

            Ok((views, total))
        })
        .await
    }

    async fn find(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn find_owned(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

/// Line items of an order in checkout order
pub async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<OrderItemModel>, ServiceError> {
    Ok(OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Position)
        .all(conn)
        .await?)
}
