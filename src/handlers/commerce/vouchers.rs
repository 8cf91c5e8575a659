use crate::handlers::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::commerce::voucher_service::{
        RemoveVoucherInput, UserVoucherView, ValidateVoucherInput, VoucherCodeInput,
        VoucherValidation,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;

/// Voucher wallet routes; mounted at the API root because the wallet
/// endpoints live outside `/vouchers`
pub fn vouchers_routes() -> Router<AppState> {
    Router::new()
        .route("/vouchers", get(list_my_vouchers))
        .route("/vouchers/validate", post(validate_voucher))
        .route("/addVoucher", post(add_voucher))
        .route("/removeVoucher", delete(remove_voucher))
}

/// Vouchers held by the caller, with their status
#[utoipa::path(
    get,
    path = "/api/v1/vouchers",
    responses((status = 200, description = "Voucher wallet", body = ApiResponse<Vec<UserVoucherView>>)),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn list_my_vouchers(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let vouchers = state
        .services
        .vouchers
        .list_user_vouchers(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(vouchers))
}

/// Preview the discount a voucher would give at checkout
#[utoipa::path(
    post,
    path = "/api/v1/vouchers/validate",
    request_body = ValidateVoucherInput,
    responses((status = 200, description = "Validation outcome; `valid` is false when a rule fails", body = ApiResponse<VoucherValidation>)),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn validate_voucher(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ValidateVoucherInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .vouchers
        .validate_voucher(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    let message = outcome.message.clone();
    Ok(message_response(StatusCode::OK, outcome, message))
}

/// Add a voucher to the caller's wallet by code
#[utoipa::path(
    post,
    path = "/api/v1/addVoucher",
    request_body = VoucherCodeInput,
    responses(
        (status = 201, description = "Voucher added", body = ApiResponse<UserVoucherView>),
        (status = 400, description = "Unknown, expired or not yet active code", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already in the wallet", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn add_voucher(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VoucherCodeInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let link = state
        .services
        .vouchers
        .add_voucher_to_user(user.user_id, &payload.code)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(link))
}

/// Remove a voucher from the caller's wallet
#[utoipa::path(
    delete,
    path = "/api/v1/removeVoucher",
    request_body = RemoveVoucherInput,
    responses(
        (status = 200, description = "Voucher removed"),
        (status = 404, description = "Voucher not in the wallet", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn remove_voucher(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RemoveVoucherInput>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .vouchers
        .remove_voucher_from_user(user.user_id, payload.voucher_id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response(
        StatusCode::OK,
        json!({ "voucher_id": payload.voucher_id }),
        "Voucher removed",
    ))
}
