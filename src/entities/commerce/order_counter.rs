use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Name of the counter row that allocates order numbers
pub const ORDER_SEQUENCE: &str = "orders";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Human-readable order number, e.g. `ORD-000042`
pub fn format_order_number(sequence: i64) -> String {
    format!("ORD-{:06}", sequence)
}
