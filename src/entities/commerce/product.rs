use super::types::{LocalizedText, StringList};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// Stock level below which an active product is flagged `low_stock`
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Catalog product as read by the cart and checkout
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub name: LocalizedText,
    #[sea_orm(column_type = "Json", nullable)]
    pub description: Option<LocalizedText>,
    #[sea_orm(nullable)]
    pub category_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub original_price: Decimal,
    /// Advertised discount percentage, informational only
    pub discount_percent: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub discount_price: Option<Decimal>,
    pub stock: i32,
    pub sold: i32,
    #[sea_orm(column_type = "Decimal(Some((3, 1)))")]
    pub rating: Decimal,
    pub review_count: i32,
    #[sea_orm(column_type = "Json")]
    pub images: StringList,
    #[sea_orm(column_type = "Json")]
    pub colors: StringList,
    #[sea_orm(column_type = "Json")]
    pub sizes: StringList,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Product status enumeration
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
    #[sea_orm(string_value = "low_stock")]
    LowStock,
}

impl ProductStatus {
    /// Status after stock changes. `inactive` is a merchant decision and sticks.
    pub fn for_stock(self, stock: i32) -> Self {
        match self {
            ProductStatus::Inactive => ProductStatus::Inactive,
            _ if stock <= 0 => ProductStatus::OutOfStock,
            _ if stock < LOW_STOCK_THRESHOLD => ProductStatus::LowStock,
            _ => ProductStatus::Active,
        }
    }

    /// Listed for sale; stock is checked separately
    pub fn is_listed(self) -> bool {
        matches!(self, ProductStatus::Active | ProductStatus::LowStock)
    }
}

impl Model {
    /// Price charged per unit right now
    pub fn unit_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.original_price)
    }

    pub fn primary_image(&self) -> Option<String> {
        self.images.first().cloned()
    }

    pub fn is_purchasable(&self) -> bool {
        self.status.is_listed() && self.stock > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ProductStatus::Active, 0, ProductStatus::OutOfStock)]
    #[case(ProductStatus::Active, 9, ProductStatus::LowStock)]
    #[case(ProductStatus::LowStock, 10, ProductStatus::Active)]
    #[case(ProductStatus::OutOfStock, 25, ProductStatus::Active)]
    #[case(ProductStatus::Inactive, 0, ProductStatus::Inactive)]
    #[case(ProductStatus::Inactive, 50, ProductStatus::Inactive)]
    fn status_follows_stock(
        #[case] current: ProductStatus,
        #[case] stock: i32,
        #[case] expected: ProductStatus,
    ) {
        assert_eq!(current.for_stock(stock), expected);
    }
}
