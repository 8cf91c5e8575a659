use crate::{
    db::{with_storage_timeout, DbPool},
    entities::commerce::{
        order, order_item, order_review, Order, OrderItem, OrderReview, OrderReviewModel,
        OrderStatus, StringList,
    },
    errors::{ErrorCode, ServiceError},
    events::{Event, EventSender},
    services::commerce::{
        order_service::{load_items, OrderLineView},
        product_catalog_service::recompute_rating,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReviewInput {
    #[serde(alias = "orderItemId")]
    pub order_item_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub comment: Option<String>,
    #[validate(length(max = 10))]
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(length(max = 10))]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderReviewModel> for ReviewView {
    fn from(review: OrderReviewModel) -> Self {
        Self {
            id: review.id,
            order_id: review.order_id,
            order_item_id: review.order_item_id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            images: review.images.0,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// An order line together with its review, if written
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewableItem {
    pub item: OrderLineView,
    pub review: Option<ReviewView>,
    pub can_review: bool,
}

/// Per-line reviews on completed orders, rolled up into product ratings
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    storage_timeout: Duration,
}

impl ReviewService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, storage_timeout: Duration) -> Self {
        Self {
            db,
            event_sender,
            storage_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn reviewable_items(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<ReviewableItem>, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let order = Order::find_by_id(order_id)
                .filter(order::Column::UserId.eq(user_id))
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            let mut reviews: HashMap<Uuid, OrderReviewModel> = OrderReview::find()
                .filter(order_review::Column::OrderId.eq(order.id))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|r| (r.order_item_id, r))
                .collect();

            let completed = order.status == OrderStatus::Completed;
            Ok(load_items(&*self.db, order.id)
                .await?
                .into_iter()
                .map(|item| {
                    let review = reviews.remove(&item.id).map(ReviewView::from);
                    ReviewableItem {
                        can_review: completed && review.is_none(),
                        item: item.into(),
                        review,
                    }
                })
                .collect())
        })
        .await
    }

    /// Reviews one line of a completed order and refreshes the product rating
    #[instrument(skip(self, input), fields(order_item_id = %input.order_item_id, rating = input.rating))]
    pub async fn create_review(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<ReviewView, ServiceError> {
        input.validate()?;

        let (review, rating, review_count) = with_storage_timeout(self.storage_timeout, async {
            let txn = self.db.begin().await?;

            let order = Order::find_by_id(order_id)
                .filter(order::Column::UserId.eq(user_id))
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            if order.status != OrderStatus::Completed {
                return Err(ServiceError::rule(
                    ErrorCode::OrderNotCompleted,
                    format!("Order {} is {} and cannot be reviewed yet", order.order_number, order.status),
                ));
            }

            let item = OrderItem::find_by_id(input.order_item_id)
                .filter(order_item::Column::OrderId.eq(order.id))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Item {} is not part of order {}",
                        input.order_item_id, order.order_number
                    ))
                })?;

            let existing = OrderReview::find()
                .filter(order_review::Column::OrderId.eq(order.id))
                .filter(order_review::Column::OrderItemId.eq(item.id))
                .one(&txn)
                .await?;
            if existing.is_some() {
                return Err(already_reviewed());
            }

            let now = Utc::now();
            let review = order_review::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                order_item_id: Set(item.id),
                user_id: Set(user_id),
                product_id: Set(item.product_id),
                rating: Set(input.rating),
                comment: Set(input.comment),
                images: Set(StringList(input.images)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => already_reviewed(),
                _ => err.into(),
            })?;

            finish(txn, review).await
        })
        .await?;

        info!(review_id = %review.id, product_id = %review.product_id, "Review created");
        self.publish_rating(review.product_id, rating, review_count).await;
        Ok(review.into())
    }

    /// Edits a review; only its author may do so
    #[instrument(skip(self, input))]
    pub async fn update_review(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        review_id: Uuid,
        input: UpdateReviewInput,
    ) -> Result<ReviewView, ServiceError> {
        input.validate()?;

        let (review, rating, review_count) = with_storage_timeout(self.storage_timeout, async {
            let txn = self.db.begin().await?;

            let review = OrderReview::find_by_id(review_id)
                .filter(order_review::Column::OrderId.eq(order_id))
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;
            if review.user_id != user_id {
                return Err(ServiceError::Forbidden(
                    "Only the author can edit this review".to_string(),
                ));
            }

            let mut active: order_review::ActiveModel = review.into();
            if let Some(rating) = input.rating {
                active.rating = Set(rating);
            }
            if let Some(comment) = input.comment {
                active.comment = Set(Some(comment));
            }
            if let Some(images) = input.images {
                active.images = Set(StringList(images));
            }
            active.updated_at = Set(Utc::now());
            let review = active.update(&txn).await?;

            finish(txn, review).await
        })
        .await?;

        info!(review_id = %review.id, "Review updated");
        self.publish_rating(review.product_id, rating, review_count).await;
        Ok(review.into())
    }

    async fn publish_rating(&self, product_id: Uuid, rating: Decimal, review_count: i32) {
        self.event_sender
            .send_or_log(Event::ProductRatingUpdated {
                product_id,
                rating,
                review_count,
            })
            .await;
    }
}

/// Recomputes the product rating inside the review transaction and commits
async fn finish(
    txn: DatabaseTransaction,
    review: OrderReviewModel,
) -> Result<(OrderReviewModel, Decimal, i32), ServiceError> {
    let (rating, review_count) = recompute_rating(&txn, review.product_id).await?;
    txn.commit().await?;
    Ok((review, rating, review_count))
}

fn already_reviewed() -> ServiceError {
    ServiceError::conflict(
        ErrorCode::AlreadyReviewed,
        "This item has already been reviewed",
    )
}
