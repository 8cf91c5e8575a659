use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Cart, voucher wallet, checkout and order lifecycle for an online shop.

## Authentication

Every endpoint except `/health` requires a bearer JWT:

```
Authorization: Bearer <your-jwt-token>
```

Admin endpoints additionally require the `admin` role claim.

## Error Handling

Failures use one envelope with a stable machine code:

```json
{
  "success": false,
  "code": "INSUFFICIENT_STOCK",
  "message": "Some cart items cannot be purchased",
  "details": { "lines": [] }
}
```

## Money

Amounts are decimal strings in the shop currency. Totals are
`subtotal - discount + shipping + tax`, never below zero.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "cart", description = "Shopping cart"),
        (name = "vouchers", description = "Voucher wallet and validation"),
        (name = "orders", description = "Checkout and order history"),
        (name = "reviews", description = "Post-purchase reviews"),
        (name = "admin", description = "Administrative endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Cart
        crate::handlers::commerce::carts::get_cart,
        crate::handlers::commerce::carts::cart_count,
        crate::handlers::commerce::carts::add_to_cart,
        crate::handlers::commerce::carts::update_cart_item,
        crate::handlers::commerce::carts::remove_cart_item,
        crate::handlers::commerce::carts::clear_cart,

        // Vouchers
        crate::handlers::commerce::vouchers::list_my_vouchers,
        crate::handlers::commerce::vouchers::validate_voucher,
        crate::handlers::commerce::vouchers::add_voucher,
        crate::handlers::commerce::vouchers::remove_voucher,

        // Orders
        crate::handlers::commerce::orders::create_order,
        crate::handlers::commerce::orders::list_orders,
        crate::handlers::commerce::orders::get_order,
        crate::handlers::commerce::orders::update_order_status,

        // Reviews
        crate::handlers::commerce::reviews::reviewable_items,
        crate::handlers::commerce::reviews::create_review,
        crate::handlers::commerce::reviews::update_review,

        // Admin
        crate::handlers::commerce::admin::list_all_orders,
        crate::handlers::commerce::admin::get_order,
        crate::handlers::commerce::admin::update_order_status,
        crate::handlers::commerce::admin::update_payment_status,
        crate::handlers::commerce::admin::create_voucher,
        crate::handlers::commerce::admin::delete_voucher,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            // Cart
            crate::services::commerce::cart_service::AddToCartInput,
            crate::services::commerce::cart_service::UpdateCartItemInput,
            crate::services::commerce::cart_service::CartView,
            crate::services::commerce::cart_service::CartLineView,
            crate::services::commerce::cart_service::CartProductView,

            // Vouchers
            crate::services::commerce::voucher_service::VoucherCodeInput,
            crate::services::commerce::voucher_service::RemoveVoucherInput,
            crate::services::commerce::voucher_service::ValidateVoucherInput,
            crate::services::commerce::voucher_service::PreviewLine,
            crate::services::commerce::voucher_service::VoucherValidation,
            crate::services::commerce::voucher_service::UserVoucherView,
            crate::services::commerce::voucher_service::CreateVoucherInput,
            crate::services::commerce::voucher_service::VoucherSummary,

            // Orders
            crate::services::commerce::checkout_service::CheckoutInput,
            crate::services::commerce::order_service::OrderView,
            crate::services::commerce::order_service::OrderLineView,
            crate::services::commerce::order_service::UpdateOrderStatusInput,
            crate::services::commerce::order_service::UpdatePaymentStatusInput,
            crate::services::commerce::pricing_service::PriceBreakdown,
            crate::entities::commerce::order::OrderStatus,
            crate::entities::commerce::order::PaymentStatus,

            // Reviews
            crate::services::commerce::review_service::CreateReviewInput,
            crate::services::commerce::review_service::UpdateReviewInput,
            crate::services::commerce::review_service::ReviewView,
            crate::services::commerce::review_service::ReviewableItem,

            // Health
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::ErrorCode,
            crate::errors::LineIssue
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/cart/items/{line_id}"));
        assert!(json.contains("bearer_auth"));
    }
}
