use crate::api::users::view::UserResponse;
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::config::Config;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    AuthUser(user): AuthUser,
    State(config): State<Arc<Config>>,
) -> impl IntoResponse {
    // Nobody can follow themselves
    Json(UserResponse::new(&user, false, &config))
}
