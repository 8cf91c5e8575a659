use crate::{
    db::DbPool,
    entities::commerce::{
        order_review, product, LocalizedText, OrderReview, Product, ProductModel, ProductStatus,
        StringList,
    },
    errors::{ErrorCode, ServiceError},
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// What the cart and checkout need to know about a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: LocalizedText,
    pub unit_price: Decimal,
    pub original_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock: i32,
    pub status: ProductStatus,
    pub category_id: Option<Uuid>,
    pub primary_image: Option<String>,
    pub colors: StringList,
    pub sizes: StringList,
}

impl ProductSnapshot {
    pub fn is_purchasable(&self) -> bool {
        self.status.is_listed() && self.stock > 0
    }
}

impl From<ProductModel> for ProductSnapshot {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            unit_price: model.unit_price(),
            primary_image: model.primary_image(),
            name: model.name,
            original_price: model.original_price,
            discount_price: model.discount_price,
            stock: model.stock,
            status: model.status,
            category_id: model.category_id,
            colors: model.colors,
            sizes: model.sizes,
        }
    }
}

/// Read-only product lookup used by the cart and voucher ledger
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductSnapshot>, ServiceError>;

    async fn get_products(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProductSnapshot>, ServiceError>;
}

/// Catalog backed by the `products` table
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DbPool>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogReader for ProductCatalogService {
    #[instrument(skip(self))]
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductSnapshot>, ServiceError> {
        Ok(Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(ProductSnapshot::from))
    }

    #[instrument(skip(self))]
    async fn get_products(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProductSnapshot>, ServiceError> {
        Ok(load_products(&*self.db, ids)
            .await?
            .into_iter()
            .map(|(id, model)| (id, ProductSnapshot::from(model)))
            .collect())
    }
}

/// Loads products by id on any connection, including an open transaction
pub async fn load_products<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, ProductModel>, ServiceError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = Product::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;

    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

/// Takes `quantity` units out of stock and adds them to `sold`.
///
/// The decrement is a single conditional update on `stock >= quantity`, so
/// concurrent reservations can never drive stock negative. When no row
/// matches the caller gets `INSUFFICIENT_STOCK`.
pub async fn reserve_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<ProductModel, ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(
            product::Column::Sold,
            Expr::col(product::Column::Sold).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(%product_id, quantity, "Stock reservation lost a race");
        return Err(ServiceError::rule(
            ErrorCode::InsufficientStock,
            format!("Product {} does not have {} units in stock", product_id, quantity),
        ));
    }

    let product = Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    refresh_status(conn, product).await
}

/// Re-derives `status` from `stock` and persists it when it changed
pub async fn refresh_status<C: ConnectionTrait>(
    conn: &C,
    product: ProductModel,
) -> Result<ProductModel, ServiceError> {
    let next = product.status.for_stock(product.stock);
    if next == product.status {
        return Ok(product);
    }

    debug!(product_id = %product.id, from = %product.status, to = %next, "Product status follows stock");
    let mut active: product::ActiveModel = product.into();
    active.status = Set(next);
    Ok(active.update(conn).await?)
}

/// Recomputes a product's average rating (one decimal) and review count
/// from its reviews.
pub async fn recompute_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<(Decimal, i32), ServiceError> {
    let ratings: Vec<i32> = OrderReview::find()
        .select_only()
        .column(order_review::Column::Rating)
        .filter(order_review::Column::ProductId.eq(product_id))
        .into_tuple()
        .all(conn)
        .await?;

    let review_count = i32::try_from(ratings.len()).unwrap_or(i32::MAX);
    let rating = average_rating(&ratings);

    Product::update_many()
        .col_expr(product::Column::Rating, Expr::value(rating))
        .col_expr(product::Column::ReviewCount, Expr::value(review_count))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;

    Ok((rating, review_count))
}

fn average_rating(ratings: &[i32]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    (Decimal::from(sum) / Decimal::from(ratings.len() as u64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
        assert_eq!(average_rating(&[5, 4]), dec!(4.5));
        assert_eq!(average_rating(&[5, 4, 4]), dec!(4.3));
        assert_eq!(average_rating(&[1, 2]), dec!(1.5));
    }
}
