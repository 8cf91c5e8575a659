pub mod commerce;
pub mod common;
pub mod health;

use crate::services::commerce::{
    cart_service::CartLimits, CartService, CatalogReader, CheckoutService, OrderService,
    PricingEngine, ProductCatalogService, ReviewService, VoucherService,
};
use crate::{config::AppConfig, db::DbPool, events::EventSender};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<dyn CatalogReader>,
    pub cart: Arc<CartService>,
    pub vouchers: Arc<VoucherService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reviews: Arc<ReviewService>,
}

impl AppServices {
    /// Wires every service against one pool, with the flat shipping and tax
    /// policies from configuration
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        let pricing = PricingEngine::flat(config.shipping_fee_flat, config.tax_rate());
        Self::with_pricing(db_pool, event_sender, config, pricing)
    }

    /// Same as [`AppServices::new`] with caller-supplied pricing policies
    pub fn with_pricing(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        pricing: PricingEngine,
    ) -> Self {
        let storage_timeout = config.storage_timeout();
        let catalog: Arc<dyn CatalogReader> = Arc::new(ProductCatalogService::new(db_pool.clone()));

        let cart = Arc::new(CartService::new(
            db_pool.clone(),
            catalog.clone(),
            CartLimits::from(config.as_ref()),
            storage_timeout,
        ));
        let vouchers = Arc::new(VoucherService::new(
            db_pool.clone(),
            catalog.clone(),
            storage_timeout,
        ));
        let checkout = Arc::new(CheckoutService::new(
            db_pool.clone(),
            event_sender.clone(),
            pricing,
            storage_timeout,
        ));
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let reviews = Arc::new(ReviewService::new(db_pool, event_sender, storage_timeout));

        Self {
            catalog,
            cart,
            vouchers,
            checkout,
            orders,
            reviews,
        }
    }
}
