use crate::handlers::common::{
    created_response, map_service_error, no_content_response, paginated_response,
    success_response, validate_input,
};
use crate::{
    auth::AdminUser,
    errors::ApiError,
    services::commerce::{
        order_service::{OrderListQuery, OrderView, UpdateOrderStatusInput, UpdatePaymentStatusInput},
        order_status::Actor,
        voucher_service::{CreateVoucherInput, VoucherSummary},
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Admin routes; every handler requires the `admin` role
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/payment-status", patch(update_payment_status))
        .route("/vouchers", post(create_voucher))
        .route("/vouchers/:id", delete(delete_voucher))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Page of orders across all users"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);

    let (orders, total) = state
        .services
        .orders
        .list_all_orders(query)
        .await
        .map_err(map_service_error)?;

    Ok(paginated_response(orders, total, page, limit))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Order detail", body = ApiResponse<OrderView>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order_admin(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Set any status on a non-terminal order
#[utoipa::path(
    patch,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderView>),
        (status = 400, description = "Order is completed or cancelled", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status, Actor::Admin, admin.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/orders/{id}/payment-status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdatePaymentStatusInput,
    responses((status = 200, description = "Payment status updated", body = ApiResponse<OrderView>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_payment_status(id, payload.payment_status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/vouchers",
    request_body = CreateVoucherInput,
    responses(
        (status = 201, description = "Voucher created", body = ApiResponse<VoucherSummary>),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_voucher(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateVoucherInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let voucher = state
        .services
        .vouchers
        .create_voucher(payload)
        .await
        .map_err(map_service_error)?;

    info!(admin = %admin.user_id, code = %voucher.code, "Voucher defined");
    Ok(created_response(VoucherSummary::from(&voucher)))
}

/// Delete a voucher no order references
#[utoipa::path(
    delete,
    path = "/api/v1/admin/vouchers/{id}",
    params(("id" = Uuid, Path, description = "Voucher id")),
    responses(
        (status = 204, description = "Voucher deleted"),
        (status = 409, description = "Referenced by an order", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_voucher(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .vouchers
        .delete_voucher(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
