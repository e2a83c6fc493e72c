use crate::api::users::view::{author_cards, AuthorWithRecipes};
use crate::api::ErrorResponse;
use crate::api::extract::{ApiPath, ApiQuery};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::memberships;
use crate::models::User;
use crate::schema::users;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SubscribeParams {
    /// Maximum number of the author's recipes to include
    pub recipes_limit: Option<usize>,
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "Author ID"),
        SubscribeParams
    ),
    responses(
        (status = 201, description = "Subscribed", body = AuthorWithRecipes),
        (status = 400, description = "Cannot subscribe to yourself", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Author not found", body = ErrorResponse),
        (status = 409, description = "Already subscribed", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn subscribe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(author_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<SubscribeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::follow(&mut conn, user.id, author_id)?;

    let author: User = users::table
        .find(author_id)
        .select(User::as_select())
        .first(&mut conn)?;

    let card = author_cards(
        &mut conn,
        &config,
        &user,
        std::slice::from_ref(&author),
        params.recipes_limit,
    )?
    .pop()
    .ok_or(ApiError::NotFound("User"))?;

    Ok((StatusCode::CREATED, Json(card)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Author or subscription not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unsubscribe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    ApiPath(author_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::unfollow(&mut conn, user.id, author_id)?;
    Ok(StatusCode::NO_CONTENT)
}
