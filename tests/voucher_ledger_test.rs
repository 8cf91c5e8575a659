//! Voucher wallet: adding by code, listing, removal, validation previews and
//! admin management.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::entities::commerce::UserVoucherStatus;

#[tokio::test]
async fn add_voucher_by_code_is_case_insensitive() {
    let app = TestApp::new().await;
    let voucher = app.seed_voucher("WELCOME", dec!(10), dec!(0)).await;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/addVoucher", Some(json!({ "code": "  welcome " })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["voucher"]["id"], voucher.id.to_string());
    assert_eq!(body["data"]["voucher"]["code"], "WELCOME");
}

#[tokio::test]
async fn adding_twice_conflicts() {
    let app = TestApp::new().await;
    app.seed_voucher("TWICE", dec!(10), dec!(0)).await;

    let first = app
        .request_authenticated(Method::POST, "/api/v1/addVoucher", Some(json!({ "code": "TWICE" })))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .request_authenticated(Method::POST, "/api/v1/addVoucher", Some(json!({ "code": "TWICE" })))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(second).await["code"], "ALREADY_ADDED");
}

#[tokio::test]
async fn unknown_or_out_of_window_codes_are_rejected() {
    let app = TestApp::new().await;
    let now = chrono::Utc::now();
    app.seed_voucher_window("GONE", dec!(10), dec!(0), None, Some(now - chrono::Duration::hours(1)))
        .await;
    app.seed_voucher_window("LATER", dec!(10), dec!(0), Some(now + chrono::Duration::hours(1)), None)
        .await;

    for (code, expected) in [
        ("NOPE", "INVALID_CODE"),
        ("GONE", "VOUCHER_EXPIRED"),
        ("LATER", "VOUCHER_NOT_STARTED"),
    ] {
        let response = app
            .request_authenticated(Method::POST, "/api/v1/addVoucher", Some(json!({ "code": code })))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "code {code}");
        assert_eq!(response_json(response).await["code"], expected, "code {code}");
    }
}

#[tokio::test]
async fn listing_expires_stale_links() {
    let app = TestApp::new().await;
    let now = chrono::Utc::now();
    let fresh = app.seed_voucher("FRESH", dec!(10), dec!(0)).await;
    let stale = app
        .seed_voucher_window("STALE", dec!(10), dec!(0), None, Some(now - chrono::Duration::days(1)))
        .await;
    app.link_voucher(app.user_id, fresh.id).await;
    let stale_link = app.link_voucher(app.user_id, stale.id).await;

    let response = app.request_authenticated(Method::GET, "/api/v1/vouchers", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let items = body["data"].as_array().expect("voucher list");
    assert_eq!(items.len(), 2);
    let stale_view = items
        .iter()
        .find(|v| v["voucher"]["code"] == "STALE")
        .expect("stale voucher listed");
    assert_eq!(stale_view["status"], "expired");

    assert_eq!(app.voucher_link(stale_link.id).await.status, UserVoucherStatus::Expired);
}

#[tokio::test]
async fn remove_voucher_from_wallet() {
    let app = TestApp::new().await;
    let voucher = app.seed_voucher("BYE", dec!(10), dec!(0)).await;
    app.link_voucher(app.user_id, voucher.id).await;

    let response = app
        .request_authenticated(
            Method::DELETE,
            "/api/v1/removeVoucher",
            Some(json!({ "voucherId": voucher.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let again = app
        .request_authenticated(
            Method::DELETE,
            "/api/v1/removeVoucher",
            Some(json!({ "voucher_id": voucher.id })),
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validate_previews_discount_from_explicit_lines() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;
    let voucher = app.seed_voucher("PREVIEW", dec!(10), dec!(100000)).await;
    app.link_voucher(app.user_id, voucher.id).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vouchers/validate",
            Some(json!({
                "code": "preview",
                "cartItems": [{ "productId": product.id, "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(decimal(&body["data"]["discount_amount"]), dec!(20000));
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn validate_rejects_non_positive_preview_quantities() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;
    let voucher = app.seed_voucher("PREVIEW", dec!(10), dec!(0)).await;
    app.link_voucher(app.user_id, voucher.id).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vouchers/validate",
            Some(json!({
                "code": "PREVIEW",
                "cartItems": [{ "productId": product.id, "quantity": -1 }]
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["code"], "VALIDATION");
}

#[tokio::test]
async fn validate_reports_rule_failures_as_invalid() {
    let app = TestApp::new().await;
    let voucher = app.seed_voucher("MINIMUM", dec!(10), dec!(500000)).await;
    app.link_voucher(app.user_id, voucher.id).await;
    app.seed_voucher("NOTMINE", dec!(10), dec!(0)).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vouchers/validate",
            Some(json!({ "code": "MINIMUM", "subtotal": "100000" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["code"], "VOUCHER_MIN_VALUE_NOT_MET");

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vouchers/validate",
            Some(json!({ "code": "NOTMINE", "subtotal": "100000" })),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["code"], "VOUCHER_NOT_AVAILABLE");
}

#[tokio::test]
async fn admin_creates_and_deletes_vouchers() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/vouchers",
            Some(json!({
                "code": "flash20",
                "name": "Flash sale",
                "discount_value": "20",
                "discount_type": "percentage",
                "min_order_value": "0"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["code"], "FLASH20");
    let voucher_id = body["data"]["id"].as_str().expect("voucher id").to_string();

    let duplicate = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/vouchers",
            Some(json!({ "code": "FLASH20", "name": "Again", "discount_value": "5" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let deleted = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/vouchers/{}", voucher_id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn voucher_referenced_by_an_order_cannot_be_deleted() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;
    let address = app.seed_address(app.user_id).await;
    let voucher = app.seed_voucher("KEEP", dec!(10), dec!(0)).await;
    app.link_voucher(app.user_id, voucher.id).await;
    app.request_authenticated(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;
    let placed = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "address_id": address.id, "voucher_id": voucher.id, "payment_method": "cod" })),
        )
        .await;
    assert_eq!(placed.status(), StatusCode::CREATED);

    let response = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/vouchers/{}", voucher.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["code"], "VOUCHER_IN_USE");
}

#[tokio::test]
async fn customers_cannot_manage_vouchers() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/vouchers",
            Some(json!({ "code": "X", "name": "X", "discount_value": "5" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
