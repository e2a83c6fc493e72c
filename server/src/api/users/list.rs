use crate::api::users::view::{user_responses, UserResponse};
use crate::api::{page_bounds, page_total, ErrorResponse, PaginationMetadata};
use crate::api::extract::ApiQuery;
use crate::auth::MaybeAuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::User;
use crate::raw_sql::count_over;
use crate::schema::users;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersParams {
    /// Number of items to return (default: 20, max: 1000)
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
    pub pagination: PaginationMetadata,
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "Users ordered by username", body = ListUsersResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn list_users(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiQuery(params): ApiQuery<ListUsersParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_bounds(params.limit, params.offset);
    let mut conn = get_conn(&pool)?;

    let rows: Vec<(User, i64)> = users::table
        .select((User::as_select(), count_over()))
        .order(users::username.asc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    let total = page_total(rows.first().map(|(_, total)| *total), offset, || {
        users::table.count().get_result(&mut conn)
    })?;
    let page: Vec<User> = rows.into_iter().map(|(u, _)| u).collect();

    Ok(Json(ListUsersResponse {
        users: user_responses(&mut conn, &config, viewer.as_ref(), &page)?,
        pagination: PaginationMetadata {
            total,
            limit,
            offset,
        },
    }))
}
