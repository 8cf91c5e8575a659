#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::commerce::{
        address, category, product, user_voucher, voucher, AddressModel, CategoryModel,
        DiscountType, LocalizedText, Product, ProductModel, ProductStatus, StringList, UserVoucher,
        UserVoucherModel, UserVoucherStatus, UuidList, VoucherModel,
    },
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application harness backed by a private in-memory SQLite database.
///
/// The pool holds a single connection, so every test sees one database and
/// concurrent transactions are serialized by the pool.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Default customer
    pub user_id: Uuid,
    token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx, Vec::new()));

        let state = AppState::new(
            Arc::new(pool),
            Arc::new(cfg),
            Arc::new(EventSender::new(event_tx)),
        );

        let user_id = Uuid::new_v4();
        let token = state
            .auth
            .issue_token(user_id, &[], Duration::from_secs(3600))
            .expect("issue customer token");
        let admin_token = state
            .auth
            .issue_token(Uuid::new_v4(), &["admin"], Duration::from_secs(3600))
            .expect("issue admin token");

        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            user_id,
            token,
            admin_token,
            _event_task: event_task,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Token for an arbitrary customer
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, &[], Duration::from_secs(3600))
            .expect("issue token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request as the default customer
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn request_as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.admin_token())).await
    }

    // ---------------------------------------------------------------- fixtures

    pub async fn seed_category(&self, slug: &str) -> CategoryModel {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(LocalizedText::from(slug)),
            slug: Set(slug.to_string()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(&self, price: Decimal, stock: i32) -> ProductModel {
        self.seed_product_in(None, price, stock).await
    }

    pub async fn seed_product_in(
        &self,
        category_id: Option<Uuid>,
        price: Decimal,
        stock: i32,
    ) -> ProductModel {
        let now = Utc::now();
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            name: Set(LocalizedText::from(format!("Product {}", &id.to_string()[..8]).as_str())),
            description: Set(None),
            category_id: Set(category_id),
            original_price: Set(price),
            discount_percent: Set(0),
            discount_price: Set(None),
            stock: Set(stock),
            sold: Set(0),
            rating: Set(Decimal::ZERO),
            review_count: Set(0),
            images: Set(StringList(vec![format!("https://cdn.example.com/{}.jpg", id)])),
            colors: Set(StringList(vec!["Red".to_string(), "Blue".to_string()])),
            sizes: Set(StringList(vec!["M".to_string(), "L".to_string()])),
            status: Set(ProductStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn product(&self, id: Uuid) -> ProductModel {
        Product::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
    }

    pub async fn set_product_status(&self, id: Uuid, status: ProductStatus) {
        let mut active: product::ActiveModel = self.product(id).await.into();
        active.status = Set(status);
        active.update(&*self.state.db).await.expect("update product status");
    }

    pub async fn set_product_stock(&self, id: Uuid, stock: i32) {
        let mut active: product::ActiveModel = self.product(id).await.into();
        active.stock = Set(stock);
        active.update(&*self.state.db).await.expect("update product stock");
    }

    pub async fn seed_address(&self, user_id: Uuid) -> AddressModel {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            recipient_name: Set("Nguyen Van A".to_string()),
            phone: Set("0901234567".to_string()),
            line1: Set("12 Le Loi".to_string()),
            ward: Set(Some("Ben Nghe".to_string())),
            district: Set(Some("District 1".to_string())),
            city: Set("Ho Chi Minh City".to_string()),
            is_default: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed address")
    }

    /// Voucher valid from yesterday to tomorrow
    pub async fn seed_voucher(
        &self,
        code: &str,
        discount_value: Decimal,
        min_order_value: Decimal,
    ) -> VoucherModel {
        let now = Utc::now();
        self.seed_voucher_window(
            code,
            discount_value,
            min_order_value,
            Some(now - chrono::Duration::days(1)),
            Some(now + chrono::Duration::days(1)),
        )
        .await
    }

    pub async fn seed_voucher_window(
        &self,
        code: &str,
        discount_value: Decimal,
        min_order_value: Decimal,
        start_date: Option<DateTime<Utc>>,
        expired_date: Option<DateTime<Utc>>,
    ) -> VoucherModel {
        let now = Utc::now();
        voucher::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Voucher {}", code)),
            description: Set(None),
            discount_value: Set(discount_value),
            discount_type: Set(DiscountType::Auto),
            min_order_value: Set(min_order_value),
            start_date: Set(start_date),
            expired_date: Set(expired_date),
            category_ids: Set(UuidList::default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed voucher")
    }

    /// Puts a voucher straight into a wallet, bypassing the window check
    pub async fn link_voucher(&self, user_id: Uuid, voucher_id: Uuid) -> UserVoucherModel {
        user_voucher::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            voucher_id: Set(voucher_id),
            status: Set(UserVoucherStatus::Active),
            added_at: Set(Utc::now()),
            used_at: Set(None),
            order_id: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("link voucher")
    }

    pub async fn voucher_link(&self, link_id: Uuid) -> UserVoucherModel {
        UserVoucher::find_by_id(link_id)
            .one(&*self.state.db)
            .await
            .expect("load voucher link")
            .expect("voucher link exists")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal serialized as a JSON string or number
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
