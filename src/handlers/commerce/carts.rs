use crate::handlers::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
    Language,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::commerce::cart_service::{AddToCartInput, CartView, UpdateCartItemInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/count", get(cart_count))
        .route("/items", post(add_to_cart).delete(clear_cart))
        .route("/items/:line_id", put(update_cart_item).delete(remove_cart_item))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCount {
    pub count: i32,
}

/// Get the caller's cart with live product details
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Current cart", body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    lang: Language,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(user.user_id, lang.as_deref())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Sum of quantities, for the cart badge
#[utoipa::path(
    get,
    path = "/api/v1/cart/count",
    responses((status = 200, description = "Item count", body = ApiResponse<CartCount>)),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn cart_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .services
        .cart
        .count(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CartCount { count }))
}

/// Add item to cart; 201 for a new line, 200 when merged into an existing one
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddToCartInput,
    responses(
        (status = 201, description = "Line created"),
        (status = 200, description = "Quantity merged into an existing line"),
        (status = 400, description = "Invalid variant, out of stock or cart full", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    lang: Language,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .cart
        .add_item(user.user_id, payload, lang.as_deref())
        .await
        .map_err(map_service_error)?;

    if outcome.merged {
        let message = if outcome.adjusted {
            "Quantity merged and capped at available stock"
        } else {
            "Quantity merged into existing line"
        };
        Ok(message_response(StatusCode::OK, outcome, message))
    } else {
        Ok(created_response(outcome))
    }
}

/// Update cart item quantity, clamped to stock
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{line_id}",
    params(("line_id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateCartItemInput,
    responses((status = 200, description = "Line updated")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    lang: Language,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .cart
        .update_item_quantity(user.user_id, line_id, payload.quantity, lang.as_deref())
        .await
        .map_err(map_service_error)?;

    if outcome.adjusted {
        let message = format!("Only {} in stock; quantity adjusted", outcome.quantity);
        Ok(message_response(StatusCode::OK, outcome, message))
    } else {
        Ok(success_response(outcome))
    }
}

/// Remove a line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{line_id}",
    params(("line_id" = Uuid, Path, description = "Cart line id")),
    responses((status = 200, description = "Updated cart", body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    lang: Language,
    Path(line_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .remove_item(user.user_id, line_id, lang.as_deref())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Clear all items from cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items",
    responses((status = 200, description = "Cart cleared")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .clear(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response(
        StatusCode::OK,
        CartCount { count: 0 },
        "Cart cleared successfully",
    ))
}
