//! Cart endpoints: merging, variant handling, stock clamping and limits.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storefront_api::entities::commerce::ProductStatus;
use uuid::Uuid;

async fn add(app: &TestApp, body: Value) -> (StatusCode, Value) {
    let response = app
        .request_authenticated(Method::POST, "/api/v1/cart/items", Some(body))
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn new_cart_is_empty() {
    let app = TestApp::new().await;

    let response = app.request_authenticated(Method::GET, "/api/v1/cart", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["lines"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["data"]["total_quantity"], 0);
    assert_eq!(decimal(&body["data"]["subtotal"]), dec!(0));
}

#[tokio::test]
async fn adding_the_same_variant_merges_lines() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 20).await;

    let (status, first) = add(
        &app,
        json!({ "product_id": product.id, "quantity": 2, "color": "red", "size": "m" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["merged"], false);

    let (status, second) = add(
        &app,
        json!({ "productId": product.id, "quantity": 3, "color": "RED", "size": "M" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["merged"], true);
    assert_eq!(second["data"]["line_id"], first["data"]["line_id"]);
    assert_eq!(second["data"]["quantity"], 5);

    let cart = &second["data"]["cart"];
    let lines = cart["lines"].as_array().expect("lines");
    assert_eq!(lines.len(), 1);
    // stored with the catalogue's spelling
    assert_eq!(lines[0]["color"], "Red");
    assert_eq!(lines[0]["size"], "M");
    assert_eq!(decimal(&cart["subtotal"]), dec!(500000));
}

#[tokio::test]
async fn different_variants_are_separate_lines() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 20).await;

    add(&app, json!({ "product_id": product.id, "quantity": 1, "color": "Red" })).await;
    let (status, body) = add(&app, json!({ "product_id": product.id, "quantity": 1, "color": "Blue" })).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["cart"]["lines"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"]["cart"]["total_quantity"], 2);
}

#[tokio::test]
async fn unknown_variant_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 20).await;

    let (status, body) = add(&app, json!({ "product_id": product.id, "quantity": 1, "color": "Green" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_VARIANT");
}

#[tokio::test]
async fn quantity_is_capped_at_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 3).await;

    let (status, body) = add(&app, json!({ "product_id": product.id, "quantity": 5 })).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(body["data"]["adjusted"], true);
}

#[tokio::test]
async fn unavailable_products_cannot_be_added() {
    let app = TestApp::new().await;
    let sold_out = app.seed_product(dec!(100000), 0).await;
    let hidden = app.seed_product(dec!(100000), 10).await;
    app.set_product_status(hidden.id, ProductStatus::Inactive).await;

    let (status, body) = add(&app, json!({ "product_id": sold_out.id, "quantity": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OUT_OF_STOCK");

    let (status, body) = add(&app, json!({ "product_id": hidden.id, "quantity": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "PRODUCT_UNAVAILABLE");

    let (status, _) = add(&app, json!({ "product_id": Uuid::new_v4(), "quantity": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_quantity_is_a_validation_error() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;

    let (status, body) = add(&app, json!({ "product_id": product.id, "quantity": 0 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn cart_line_limit_is_enforced() {
    let app = TestApp::with_config(|cfg| cfg.cart_max_lines = 2).await;
    let a = app.seed_product(dec!(1000), 10).await;
    let b = app.seed_product(dec!(1000), 10).await;
    let c = app.seed_product(dec!(1000), 10).await;

    add(&app, json!({ "product_id": a.id, "quantity": 1 })).await;
    add(&app, json!({ "product_id": b.id, "quantity": 1 })).await;
    let (status, body) = add(&app, json!({ "product_id": c.id, "quantity": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CART_FULL");

    // merging into an existing line is still allowed
    let (status, _) = add(&app, json!({ "product_id": a.id, "quantity": 1 })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_clamps_to_live_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;
    let (_, added) = add(&app, json!({ "product_id": product.id, "quantity": 1 })).await;
    let line_id = added["data"]["line_id"].as_str().expect("line id").to_string();

    app.set_product_stock(product.id, 4).await;

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", line_id),
            Some(json!({ "quantity": 9 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["quantity"], 4);
    assert_eq!(body["data"]["adjusted"], true);
    assert!(body["message"].as_str().is_some());

    app.set_product_stock(product.id, 0).await;
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", line_id),
            Some(json!({ "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["code"], "OUT_OF_STOCK");
}

#[tokio::test]
async fn lines_of_other_users_are_not_found() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100000), 10).await;
    let (_, added) = add(&app, json!({ "product_id": product.id, "quantity": 1 })).await;
    let line_id = added["data"]["line_id"].as_str().expect("line id").to_string();

    let stranger = app.token_for(Uuid::new_v4());
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", line_id),
            None,
            Some(&stranger),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remove_and_clear() {
    let app = TestApp::new().await;
    let a = app.seed_product(dec!(1000), 10).await;
    let b = app.seed_product(dec!(1000), 10).await;
    let (_, added) = add(&app, json!({ "product_id": a.id, "quantity": 2 })).await;
    add(&app, json!({ "product_id": b.id, "quantity": 3 })).await;
    let line_id = added["data"]["line_id"].as_str().expect("line id").to_string();

    let count = response_json(app.request_authenticated(Method::GET, "/api/v1/cart/count", None).await).await;
    assert_eq!(count["data"]["count"], 5);

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/cart/items/{}", line_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["lines"].as_array().map(Vec::len), Some(1));

    let response = app.request_authenticated(Method::DELETE, "/api/v1/cart/items", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let count = response_json(app.request_authenticated(Method::GET, "/api/v1/cart/count", None).await).await;
    assert_eq!(count["data"]["count"], 0);
}

#[tokio::test]
async fn cart_requires_a_valid_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
