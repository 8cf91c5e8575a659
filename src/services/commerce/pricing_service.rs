//! Pure pricing: line totals, voucher discount and eligibility, shipping,
//! tax and the order total. Voucher preview and checkout both price through
//! [`evaluate_voucher`] and [`PricingEngine::price`], so a quote always equals
//! the charge.

use crate::{
    entities::commerce::{AddressModel, DiscountType, VoucherModel},
    errors::{ErrorCode, ServiceError},
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Shipping fee strategy; the address is passed for carrier-rate lookups
pub trait ShippingPolicy: Send + Sync {
    fn shipping_fee(&self, address: Option<&AddressModel>, subtotal: Decimal) -> Decimal;
}

/// Tax strategy, applied to the discounted subtotal
pub trait TaxPolicy: Send + Sync {
    fn tax(&self, address: Option<&AddressModel>, taxable: Decimal) -> Decimal;
}

/// Same fee for every order
#[derive(Debug, Clone)]
pub struct FlatShipping {
    pub fee: Decimal,
}

impl ShippingPolicy for FlatShipping {
    fn shipping_fee(&self, _address: Option<&AddressModel>, _subtotal: Decimal) -> Decimal {
        self.fee
    }
}

/// Flat rate; a rate of zero disables tax
#[derive(Debug, Clone)]
pub struct RateTax {
    pub rate: Decimal,
}

impl TaxPolicy for RateTax {
    fn tax(&self, _address: Option<&AddressModel>, taxable: Decimal) -> Decimal {
        (taxable.max(Decimal::ZERO) * self.rate).round_dp(2)
    }
}

/// One line to be priced
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

pub fn subtotal(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(PricedLine::line_total).sum()
}

/// Discount granted by `voucher` on `subtotal`, unrounded.
///
/// `auto` keeps the legacy overload: a value below 1 is a fixed amount,
/// anything else a percentage.
pub fn voucher_discount(voucher: &VoucherModel, subtotal: Decimal) -> Decimal {
    let value = voucher.discount_value;
    match voucher.discount_type {
        DiscountType::Fixed => value,
        DiscountType::Percentage => subtotal * value / Decimal::ONE_HUNDRED,
        DiscountType::Auto if value < Decimal::ONE => value,
        DiscountType::Auto => subtotal * value / Decimal::ONE_HUNDRED,
    }
}

/// Checks minimum order value, then category eligibility, and returns the
/// discount. An empty eligible-category list applies to every order.
pub fn evaluate_voucher(
    voucher: &VoucherModel,
    subtotal: Decimal,
    line_categories: &[Option<Uuid>],
) -> Result<Decimal, ServiceError> {
    if subtotal < voucher.min_order_value {
        return Err(ServiceError::rule(
            ErrorCode::VoucherMinValueNotMet,
            format!(
                "Order subtotal {} is below the minimum {} for voucher {}",
                subtotal, voucher.min_order_value, voucher.code
            ),
        ));
    }

    if !voucher.category_ids.is_empty()
        && !line_categories
            .iter()
            .flatten()
            .any(|category| voucher.category_ids.contains(category))
    {
        return Err(ServiceError::rule(
            ErrorCode::VoucherNotApplicable,
            format!("Voucher {} does not apply to any product in the cart", voucher.code),
        ));
    }

    Ok(voucher_discount(voucher, subtotal))
}

/// `max(0, subtotal + shipping - discount + tax)`
pub fn order_total(subtotal: Decimal, shipping_fee: Decimal, discount: Decimal, tax: Decimal) -> Decimal {
    (subtotal + shipping_fee - discount + tax).max(Decimal::ZERO)
}

#[derive(Clone)]
pub struct PricingEngine {
    shipping: Arc<dyn ShippingPolicy>,
    tax: Arc<dyn TaxPolicy>,
}

impl PricingEngine {
    pub fn new(shipping: Arc<dyn ShippingPolicy>, tax: Arc<dyn TaxPolicy>) -> Self {
        Self { shipping, tax }
    }

    /// Flat shipping fee and a flat tax rate
    pub fn flat(shipping_fee: Decimal, tax_rate: Decimal) -> Self {
        Self::new(
            Arc::new(FlatShipping { fee: shipping_fee }),
            Arc::new(RateTax { rate: tax_rate }),
        )
    }

    pub fn price(
        &self,
        lines: &[PricedLine],
        discount: Decimal,
        address: Option<&AddressModel>,
    ) -> PriceBreakdown {
        let subtotal = subtotal(lines);
        let shipping_fee = self.shipping.shipping_fee(address, subtotal);
        let tax = self.tax.tax(address, subtotal - discount);
        PriceBreakdown {
            subtotal,
            shipping_fee,
            discount,
            tax,
            total: order_total(subtotal, shipping_fee, discount, tax),
        }
    }
}
