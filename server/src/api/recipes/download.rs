use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::shopping_list::{build_shopping_list, render};
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

pub const FILENAME: &str = "shopping_list.txt";

#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    tag = "recipes",
    responses(
        (status = 200, description = "Aggregated shopping list", content_type = "text/plain", body = String),
        (status = 400, description = "Shopping cart is empty", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_shopping_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    let entries = build_shopping_list(&mut conn, user.id)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{FILENAME}\""),
            ),
        ],
        render(&entries),
    ))
}
