//! Storefront API Library
//!
//! Carts, voucher wallet, checkout with atomic stock reservation, the order
//! lifecycle and post-purchase reviews, served over HTTP under `/api/v1`.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Builds the state with services wired from `config`
    pub fn new(
        db: Arc<db::DbPool>,
        config: Arc<config::AppConfig>,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), config.clone());
        Self::with_services(db, config, event_sender, services)
    }

    pub fn with_services(
        db: Arc<db::DbPool>,
        config: Arc<config::AppConfig>,
        event_sender: Arc<events::EventSender>,
        services: handlers::AppServices,
    ) -> Self {
        let auth = Arc::new(auth::AuthService::new(auth::AuthConfig::from(config.as_ref())));
        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    /// Success envelope carrying a human-readable message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }


    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2], 5, 1, 2);
        assert_eq!(page.total_pages, 3);

        let empty = PaginatedResponse::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Routes served under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::commerce;

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/cart", commerce::carts_routes())
        .merge(commerce::vouchers_routes())
        .nest(
            "/orders",
            commerce::orders_routes().merge(commerce::reviews_routes()),
        )
        .nest("/admin", commerce::admin_routes())
}

/// Full application router: API, Swagger UI, request ids, tracing and the
/// request timeout. CORS is added by the binary.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();

    Router::<AppState>::new()
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(TimeoutLayer::new(request_timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
