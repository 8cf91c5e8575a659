/// Commerce API handlers module
pub mod admin;
pub mod carts;
pub mod orders;
pub mod reviews;
pub mod vouchers;

// Re-export route builders
pub use admin::admin_routes;
pub use carts::carts_routes;
pub use orders::orders_routes;
pub use reviews::reviews_routes;
pub use vouchers::vouchers_routes;
