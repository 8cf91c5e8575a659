use crate::{
    db::{with_storage_timeout, DbPool},
    entities::commerce::{
        address, order, order_counter, order_item, user_voucher, Address, CartItemModel,
        CartModel, OrderCounter, OrderItemModel, OrderStatus, PaymentMethod, PaymentStatus,
        ProductModel, ProductStatus, UserVoucher, Voucher, VoucherModel, VoucherWindow,
        DEFAULT_LANGUAGE,
    },
    errors::{ErrorCode, LineIssue, ServiceError},
    events::{Event, EventSender},
    services::commerce::{
        cart_service::{clear_lines, find_cart, load_lines},
        order_service::OrderView,
        pricing_service::{self, evaluate_voucher, PriceBreakdown, PricedLine, PricingEngine},
        product_catalog_service::{load_products, reserve_stock},
        voucher_service::{ensure_link_usable, expire_links, redeem_link},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    #[serde(alias = "addressId")]
    pub address_id: Uuid,
    #[serde(default, alias = "voucherId")]
    pub voucher_id: Option<Uuid>,
    /// One of `cod`, `bank_transfer`, `credit_card`, `e_wallet`
    #[serde(alias = "paymentMethod")]
    pub payment_method: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub notes: Option<String>,
}

/// Everything checked and priced before the commit starts
struct ValidatedCheckout {
    cart: CartModel,
    lines: Vec<(CartItemModel, ProductModel)>,
    payment_method: PaymentMethod,
    voucher: Option<(VoucherModel, user_voucher::Model)>,
    breakdown: PriceBreakdown,
}

/// Converts a user's cart into an order.
///
/// Preconditions are checked in a fixed order and the first failure aborts
/// with no side effects. The commit (stock, voucher, order number, order
/// rows, cart clear) is one database transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    pricing: PricingEngine,
    storage_timeout: Duration,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        pricing: PricingEngine,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            db,
            event_sender,
            pricing,
            storage_timeout,
        }
    }

    #[instrument(skip(self, input), fields(address_id = %input.address_id, voucher_id = ?input.voucher_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        input: CheckoutInput,
        lang: Option<&str>,
    ) -> Result<OrderView, ServiceError> {
        input.validate()?;
        let lang = lang.unwrap_or(DEFAULT_LANGUAGE).to_string();

        let result = crate::tracing::timed(
            "checkout",
            with_storage_timeout(self.storage_timeout, self.run(user_id, input, &lang)),
        )
        .await;

        match result {
            Ok(view) => {
                metrics::counter!("storefront.checkout.completed", 1);
                self.event_sender
                    .send_or_log(Event::OrderCreated {
                        order_id: view.id,
                        order_number: view.order_number.clone(),
                        user_id,
                        total_price: view.total_price,
                    })
                    .await;
                if let Some(voucher_id) = view.voucher_id {
                    self.event_sender
                        .send_or_log(Event::VoucherRedeemed {
                            voucher_id,
                            user_id,
                            order_id: view.id,
                        })
                        .await;
                }
                Ok(view)
            }
            Err(err) => {
                metrics::counter!("storefront.checkout.rejected", 1, "code" => err.code().to_string());
                Err(err)
            }
        }
    }

    async fn run(&self, user_id: Uuid, input: CheckoutInput, lang: &str) -> Result<OrderView, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let validated = match self.validate(&txn, user_id, &input, now).await {
            Ok(validated) => validated,
            Err(Rejection::ExpireVoucher { link_id, error }) => {
                // The expiry flip must outlive the aborted checkout
                txn.rollback().await?;
                expire_links(&*self.db, vec![link_id]).await?;
                return Err(error);
            }
            Err(Rejection::Error(error)) => return Err(error),
        };

        let view = self
            .commit(txn, user_id, input, validated, lang, now)
            .await?;

        info!(
            order_number = %view.order_number,
            %user_id,
            total = %view.total_price,
            lines = view.items.len(),
            "Order placed"
        );
        Ok(view)
    }

    async fn validate(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
        input: &CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<ValidatedCheckout, Rejection> {
        // 1. non-empty cart
        let cart = find_cart(txn, user_id).await?;
        let items = match &cart {
            Some(cart) => load_lines(txn, cart.id).await?,
            None => Vec::new(),
        };
        let cart = match cart {
            Some(cart) if !items.is_empty() => cart,
            _ => {
                return Err(ServiceError::rule(ErrorCode::EmptyCart, "Your cart is empty").into());
            }
        };

        // 2. address owned by the user
        let address = Address::find_by_id(input.address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::rule(
                    ErrorCode::AddressNotFound,
                    format!("Address {} not found", input.address_id),
                )
            })?;

        // 3. payment method
        let payment_method = PaymentMethod::from_str(input.payment_method.trim()).map_err(|_| {
            ServiceError::rule(
                ErrorCode::InvalidPaymentMethod,
                format!("Unsupported payment method '{}'", input.payment_method),
            )
        })?;

        // 4. voucher possession and window
        let voucher = match input.voucher_id {
            Some(voucher_id) => Some(self.usable_voucher(txn, user_id, voucher_id, now).await?),
            None => None,
        };

        // 5. every line against live stock, reported together
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = load_products(txn, &product_ids).await?;
        // variant lines of one product draw on the same stock
        let mut demand: HashMap<Uuid, i32> = HashMap::new();
        for item in &items {
            *demand.entry(item.product_id).or_default() += item.quantity;
        }
        let mut issues = Vec::new();
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            // sold out is a stock failure, not a delisting
            let product = match products.get(&item.product_id) {
                Some(product) if product.status.is_listed() || product.status == ProductStatus::OutOfStock => {
                    product
                }
                _ => {
                    issues.push(LineIssue {
                        line_id: item.id,
                        product_id: item.product_id,
                        code: ErrorCode::ProductUnavailable,
                        message: format!("Product {} is no longer available", item.product_id),
                        requested: item.quantity,
                        available: 0,
                    });
                    continue;
                }
            };
            let wanted = demand.get(&item.product_id).copied().unwrap_or(item.quantity);
            if wanted > product.stock || product.status == ProductStatus::OutOfStock {
                issues.push(LineIssue {
                    line_id: item.id,
                    product_id: item.product_id,
                    code: ErrorCode::InsufficientStock,
                    message: format!(
                        "Only {} units of {} left in stock",
                        product.stock,
                        product.name.resolve_default()
                    ),
                    requested: item.quantity,
                    available: product.stock,
                });
            }
            lines.push((item, product.clone()));
        }
        if !issues.is_empty() {
            warn!(%user_id, rejected = issues.len(), "Checkout rejected cart lines");
            return Err(ServiceError::CartLinesRejected(issues).into());
        }

        // 6. voucher eligibility, then price
        let priced: Vec<PricedLine> = lines
            .iter()
            .map(|(item, product)| PricedLine {
                product_id: product.id,
                category_id: product.category_id,
                unit_price: product.unit_price(),
                quantity: item.quantity,
            })
            .collect();
        let subtotal = pricing_service::subtotal(&priced);
        let discount = match &voucher {
            Some((voucher, _)) => {
                let categories: Vec<Option<Uuid>> = priced.iter().map(|l| l.category_id).collect();
                evaluate_voucher(voucher, subtotal, &categories)?
            }
            None => Decimal::ZERO,
        };
        let breakdown = self.pricing.price(&priced, discount, Some(&address));

        Ok(ValidatedCheckout {
            cart,
            lines,
            payment_method,
            voucher,
            breakdown,
        })
    }

    async fn usable_voucher(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
        voucher_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(VoucherModel, user_voucher::Model), Rejection> {
        let voucher = Voucher::find_by_id(voucher_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", voucher_id)))?;

        let link = UserVoucher::find()
            .filter(user_voucher::Column::UserId.eq(user_id))
            .filter(user_voucher::Column::VoucherId.eq(voucher_id))
            .one(txn)
            .await?;
        ensure_link_usable(link.as_ref(), &voucher)?;
        let link = link.ok_or_else(|| {
            ServiceError::rule(ErrorCode::VoucherNotAvailable, "Voucher is not in your wallet")
        })?;

        match voucher.window_at(now) {
            VoucherWindow::Active => Ok((voucher, link)),
            VoucherWindow::Expired => Err(Rejection::ExpireVoucher {
                link_id: link.id,
                error: ServiceError::rule(
                    ErrorCode::VoucherExpired,
                    format!("Voucher {} has expired", voucher.code),
                ),
            }),
            VoucherWindow::NotStarted => Err(ServiceError::rule(
                ErrorCode::VoucherNotStarted,
                format!("Voucher {} is not active yet", voucher.code),
            )
            .into()),
        }
    }

    async fn commit(
        &self,
        txn: DatabaseTransaction,
        user_id: Uuid,
        input: CheckoutInput,
        validated: ValidatedCheckout,
        lang: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderView, ServiceError> {
        let ValidatedCheckout {
            cart,
            lines,
            payment_method,
            voucher,
            breakdown,
        } = validated;
        let order_id = Uuid::new_v4();

        for (item, _) in &lines {
            reserve_stock(&txn, item.product_id, item.quantity).await?;
        }

        if let Some((voucher, link)) = &voucher {
            redeem_link(&txn, link.id, &voucher.code, order_id, now).await?;
        }

        let order_number = next_order_number(&txn).await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            user_id: Set(user_id),
            address_id: Set(input.address_id),
            subtotal: Set(breakdown.subtotal),
            shipping_fee: Set(breakdown.shipping_fee),
            discount: Set(breakdown.discount),
            tax: Set(breakdown.tax),
            total_price: Set(breakdown.total),
            voucher_id: Set(voucher.as_ref().map(|(v, _)| v.id)),
            payment_method: Set(payment_method),
            payment_status: Set(PaymentStatus::Pending),
            status: Set(OrderStatus::Pending),
            notes: Set(input.notes.filter(|n| !n.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let mut items: Vec<OrderItemModel> = Vec::with_capacity(lines.len());
        for (position, (item, product)) in lines.iter().enumerate() {
            let unit_price = product.unit_price();
            let row = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
                product_id: Set(product.id),
                product_name: Set(product.name.resolve(lang).to_string()),
                product_image: Set(product.primary_image()),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                line_total: Set(unit_price * Decimal::from(item.quantity)),
                color: Set(item.color.clone()),
                size: Set(item.size.clone()),
            }
            .insert(&txn)
            .await?;
            items.push(row);
        }

        clear_lines(&txn, cart).await?;
        txn.commit().await?;

        Ok(OrderView::new(order, items))
    }
}

/// Takes the next value of the order sequence inside the checkout transaction
async fn next_order_number(txn: &DatabaseTransaction) -> Result<String, ServiceError> {
    OrderCounter::update_many()
        .col_expr(
            order_counter::Column::Value,
            Expr::col(order_counter::Column::Value).add(1),
        )
        .filter(order_counter::Column::Name.eq(order_counter::ORDER_SEQUENCE))
        .exec(txn)
        .await?;

    let counter = OrderCounter::find_by_id(order_counter::ORDER_SEQUENCE.to_string())
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::InternalError("order sequence is not initialised".into()))?;

    Ok(order_counter::format_order_number(counter.value))
}

/// A failed precondition. An expired voucher also asks the caller to flip
/// the user's link to `expired` outside the aborted transaction.
enum Rejection {
    Error(ServiceError),
    ExpireVoucher { link_id: Uuid, error: ServiceError },
}

impl From<ServiceError> for Rejection {
    fn from(err: ServiceError) -> Self {
        Rejection::Error(err)
    }
}

impl From<sea_orm::DbErr> for Rejection {
    fn from(err: sea_orm::DbErr) -> Self {
        Rejection::Error(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_input_accepts_camel_case_aliases() {
        let address_id = Uuid::new_v4();
        let input: CheckoutInput = serde_json::from_value(serde_json::json!({
            "addressId": address_id,
            "paymentMethod": "cod",
        }))
        .unwrap();

        assert_eq!(input.address_id, address_id);
        assert_eq!(input.voucher_id, None);
        assert_eq!(input.payment_method, "cod");
    }

    #[test]
    fn payment_methods_parse_from_snake_case() {
        assert_eq!(PaymentMethod::from_str("bank_transfer").unwrap(), PaymentMethod::BankTransfer);
        assert_eq!(PaymentMethod::from_str("e_wallet").unwrap(), PaymentMethod::EWallet);
        assert!(PaymentMethod::from_str("bitcoin").is_err());
    }

    #[test]
    fn notes_longer_than_limit_fail_validation() {
        let input = CheckoutInput {
            address_id: Uuid::new_v4(),
            voucher_id: None,
            payment_method: "cod".into(),
            notes: Some("x".repeat(1001)),
        };
        assert!(input.validate().is_err());
    }
}
