/// Commerce services - cart, vouchers, checkout, orders and reviews
pub mod cart_service;
pub mod checkout_service;
pub mod order_service;
pub mod order_status;
pub mod pricing_service;
pub mod product_catalog_service;
pub mod review_service;
pub mod voucher_service;

// Re-export services for convenience
pub use cart_service::{AddToCartInput, CartLimits, CartService, CartView, UpdateCartItemInput};
pub use checkout_service::{CheckoutInput, CheckoutService};
pub use order_service::{OrderListQuery, OrderService, OrderView};
pub use order_status::Actor;
pub use pricing_service::{PriceBreakdown, PricingEngine, ShippingPolicy, TaxPolicy};
pub use product_catalog_service::{CatalogReader, ProductCatalogService, ProductSnapshot};
pub use review_service::{CreateReviewInput, ReviewService, ReviewView, UpdateReviewInput};
pub use voucher_service::{ValidateVoucherInput, VoucherService, VoucherValidation};
