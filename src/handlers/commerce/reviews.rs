use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::commerce::review_service::{
        CreateReviewInput, ReviewView, ReviewableItem, UpdateReviewInput,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

/// Review routes, nested under `/orders`
pub fn reviews_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/reviewable-items", get(reviewable_items))
        .route("/:id/reviews", post(create_review))
        .route("/:id/reviews/:review_id", patch(update_review))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/reviewable-items",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Order lines with their reviews", body = ApiResponse<Vec<ReviewableItem>>)),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub async fn reviewable_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .reviews
        .reviewable_items(user.user_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Review one line of a completed order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reviews",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = CreateReviewInput,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<ReviewView>),
        (status = 400, description = "Order not completed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Line already reviewed", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CreateReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let review = state
        .services
        .reviews
        .create_review(user.user_id, order_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(review))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("review_id" = Uuid, Path, description = "Review id"),
    ),
    request_body = UpdateReviewInput,
    responses(
        (status = 200, description = "Review updated", body = ApiResponse<ReviewView>),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path((order_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let review = state
        .services
        .reviews
        .update_review(user.user_id, order_id, review_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(review))
}
