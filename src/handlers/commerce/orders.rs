use crate::handlers::common::{
    created_response, map_service_error, paginated_response, success_response, validate_input,
    Language,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::commerce::{
        checkout_service::CheckoutInput,
        order_service::{OrderListQuery, OrderView, UpdateOrderStatusInput},
        order_status::Actor,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use uuid::Uuid;

/// Creates the router for customer order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
}

/// Check out the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderView>),
        (status = 400, description = "A checkout precondition failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address or voucher not found", body = crate::errors::ErrorResponse),
        (status = 503, description = "Storage unavailable, retry", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    lang: Language,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .checkout
        .checkout(user.user_id, payload, lang.as_deref())
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses((status = 200, description = "Page of orders")),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);

    let (orders, total) = state
        .services
        .orders
        .list_orders(user.user_id, query)
        .await
        .map_err(map_service_error)?;

    Ok(paginated_response(orders, total, page, limit))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderView>),
        (status = 404, description = "No such order for this user", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(user.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Customer status change; only cancellation of pending or processing orders is allowed
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderView>),
        (status = 400, description = "Invalid status transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Customers may only cancel", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status, Actor::Customer, user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
