use crate::api::users::view::{author_cards, AuthorWithRecipes};
use crate::api::{page_bounds, page_total, ErrorResponse, PaginationMetadata};
use crate::api::extract::ApiQuery;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::User;
use crate::raw_sql::count_over;
use crate::schema::{follows, users};
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
pub struct SubscriptionsParams {
    /// Number of authors to return (default: 20, max: 1000)
    pub limit: Option<i64>,
    /// Number of authors to skip (default: 0)
    pub offset: Option<i64>,
    /// Maximum number of recipes to include per author
    pub recipes_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionsResponse {
    pub authors: Vec<AuthorWithRecipes>,
    pub pagination: PaginationMetadata,
}

#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    tag = "users",
    params(SubscriptionsParams),
    responses(
        (status = 200, description = "Followed authors, most recently followed first", body = SubscriptionsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_subscriptions(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiQuery(params): ApiQuery<SubscriptionsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_bounds(params.limit, params.offset);
    let mut conn = get_conn(&pool)?;

    // follows has two foreign keys into users, so the join needs an explicit ON
    let rows: Vec<(User, i64)> = users::table
        .inner_join(follows::table.on(follows::author_id.eq(users::id)))
        .filter(follows::user_id.eq(user.id))
        .select((User::as_select(), count_over()))
        .order(follows::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    let total = page_total(rows.first().map(|(_, total)| *total), offset, || {
        follows::table
            .filter(follows::user_id.eq(user.id))
            .count()
            .get_result(&mut conn)
    })?;
    let authors: Vec<User> = rows.into_iter().map(|(u, _)| u).collect();

    Ok(Json(SubscriptionsResponse {
        authors: author_cards(&mut conn, &config, &user, &authors, params.recipes_limit)?,
        pagination: PaginationMetadata {
            total,
            limit,
            offset,
        },
    }))
}
