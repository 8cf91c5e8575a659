use super::types::UuidList;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Voucher definition. `code` is stored upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub min_order_value: Decimal,
    #[sea_orm(nullable)]
    pub start_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub expired_date: Option<DateTime<Utc>>,
    /// Eligible categories; empty means every category
    #[sea_orm(column_type = "Json")]
    pub category_ids: UuidList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_voucher::Entity")]
    UserVouchers,
}

impl Related<super::user_voucher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserVouchers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

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
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscountType {
    /// Values below 1 are a fixed amount, otherwise a percentage
    #[sea_orm(string_value = "auto")]
    Auto,
    #[sea_orm(string_value = "fixed")]
    Fixed,
    #[sea_orm(string_value = "percentage")]
    Percentage,
}

/// Where `now` falls relative to a voucher's validity window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherWindow {
    NotStarted,
    Active,
    Expired,
}

impl Model {
    pub fn window_at(&self, now: DateTime<Utc>) -> VoucherWindow {
        if self.expired_date.map_or(false, |end| end < now) {
            VoucherWindow::Expired
        } else if self.start_date.map_or(false, |start| start > now) {
            VoucherWindow::NotStarted
        } else {
            VoucherWindow::Active
        }
    }
}

/// Trim and upper-case a user-entered voucher code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
