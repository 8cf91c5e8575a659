//! Order status state machine.
//!
//! ```text
//! pending -> processing -> shipping -> completed
//! pending | processing -> cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Customers may only cancel, and
//! only before shipping. Admins may move a non-terminal order to any other
//! status.

use crate::{
    entities::commerce::{order, OrderModel, OrderStatus},
    errors::{ErrorCode, ServiceError},
};
use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who is asking for the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Admin,
}

/// Checks `from -> to` for `actor`
pub fn check_transition(from: OrderStatus, to: OrderStatus, actor: Actor) -> Result<(), ServiceError> {
    match from {
        OrderStatus::Cancelled => return Err(invalid("Order is already cancelled")),
        OrderStatus::Completed => return Err(invalid("Order is already completed")),
        _ => {}
    }

    match actor {
        Actor::Customer => match (from, to) {
            (OrderStatus::Pending | OrderStatus::Processing, OrderStatus::Cancelled) => Ok(()),
            (OrderStatus::Shipping, OrderStatus::Cancelled) => {
                Err(invalid("Order has already shipped and cannot be cancelled"))
            }
            _ => Err(ServiceError::Forbidden(format!(
                "Customers can only cancel orders, not set them to {}",
                to
            ))),
        },
        // any write to a non-terminal order, including the current status
        Actor::Admin => Ok(()),
    }
}

/// Builds the update for an allowed transition. `completed_at` is written
/// only the first time an order completes.
pub fn apply_transition(current: OrderModel, to: OrderStatus, now: DateTime<Utc>) -> order::ActiveModel {
    let version = current.version;
    let first_completion = to == OrderStatus::Completed && current.completed_at.is_none();

    let mut active: order::ActiveModel = current.into();
    active.status = Set(to);
    active.updated_at = Set(now);
    active.version = Set(version + 1);
    if first_completion {
        active.completed_at = Set(Some(now));
    }
    active
}

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::rule(ErrorCode::InvalidStatusTransition, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::commerce::{PaymentMethod, PaymentStatus};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use sea_orm::ActiveValue;
    use uuid::Uuid;

    use OrderStatus::*;

    #[rstest]
    #[case(Pending, Cancelled, Actor::Customer)]
    #[case(Processing, Cancelled, Actor::Customer)]
    #[case(Pending, Processing, Actor::Admin)]
    #[case(Processing, Shipping, Actor::Admin)]
    #[case(Shipping, Completed, Actor::Admin)]
    #[case(Pending, Completed, Actor::Admin)]
    #[case(Shipping, Cancelled, Actor::Admin)]
    #[case(Processing, Processing, Actor::Admin)]
    fn allowed(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] actor: Actor) {
        assert!(check_transition(from, to, actor).is_ok());
    }

    #[rstest]
    #[case(Shipping, Cancelled, Actor::Customer, "already shipped")]
    #[case(Cancelled, Cancelled, Actor::Customer, "already cancelled")]
    #[case(Completed, Cancelled, Actor::Customer, "already completed")]
    #[case(Cancelled, Pending, Actor::Admin, "already cancelled")]
    #[case(Completed, Shipping, Actor::Admin, "already completed")]
    fn rejected_as_invalid(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] actor: Actor,
        #[case] reason: &str,
    ) {
        let err = check_transition(from, to, actor).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStatusTransition);
        assert!(err.to_string().contains(reason), "{}", err);
    }

    #[test]
    fn customers_cannot_advance_orders() {
        assert_matches!(
            check_transition(Pending, Processing, Actor::Customer),
            Err(ServiceError::Forbidden(_))
        );
    }

    fn order(status: OrderStatus) -> OrderModel {
        let now = Utc::now();
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "ORD-000001".into(),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            subtotal: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            total_price: Decimal::ZERO,
            voucher_id: None,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            status,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 1,
        }
    }

    #[test]
    fn completion_time_is_written_once() {
        let now = Utc::now();
        let active = apply_transition(order(Shipping), Completed, now);
        assert_eq!(active.completed_at, ActiveValue::Set(Some(now)));
        assert_eq!(active.version, ActiveValue::Set(2));

        let earlier = now - chrono::Duration::days(3);
        let mut done = order(Shipping);
        done.completed_at = Some(earlier);
        let active = apply_transition(done, Completed, now);
        assert_eq!(active.completed_at, ActiveValue::Unchanged(Some(earlier)));
    }
}
