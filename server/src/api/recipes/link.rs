use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::schema::recipes;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use diesel::dsl::exists;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

pub fn recipe_link(config: &Config, id: Uuid) -> String {
    format!("{}/recipes/{}", config.public_base_url, id)
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}/get-link",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 200, description = "Shareable link", body = RecipeLinkResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    )
)]
pub async fn get_link(
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    let found: bool = diesel::select(exists(recipes::table.find(id))).get_result(&mut conn)?;
    if !found {
        return Err(ApiError::NotFound("Recipe"));
    }

    Ok(Json(RecipeLinkResponse {
        short_link: recipe_link(&config, id),
    }))
}
