pub mod auth;
pub mod extract;
pub mod ingredients;
pub mod recipes;
pub mod shopping_cart;
pub mod users;

use serde::Serialize;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{OpenApi, ToSchema};

use crate::models::{Ingredient, SnapshotLine};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Shared error response used by all endpoints
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMetadata {
    /// Total number of items available
    pub total: i64,
    /// Number of items requested (limit)
    pub limit: i64,
    /// Number of items skipped (offset)
    pub offset: i64,
}

/// Applies defaults and bounds to `limit`/`offset` query parameters.
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// Resolves a page's total from the first row's `COUNT(*) OVER()`.
/// An empty page past the end carries no window total, so `count` runs instead.
pub fn page_total<E>(
    first_row_total: Option<i64>,
    offset: i64,
    count: impl FnOnce() -> Result<i64, E>,
) -> Result<i64, E> {
    match first_row_total {
        Some(total) => Ok(total),
        None if offset > 0 => count(),
        None => Ok(0),
    }
}

/// Generate the complete OpenAPI spec by merging all module specs
pub fn openapi() -> utoipa::openapi::OpenApi {
    #[derive(OpenApi)]
    #[openapi(
        info(title = "Foodgram API"),
        components(schemas(ErrorResponse, PaginationMetadata, Ingredient, SnapshotLine))
    )]
    struct BaseApi;

    let mut spec = BaseApi::openapi();

    // Both `Token <t>` and `Bearer <t>` are accepted; document the standard one
    if let Some(components) = spec.components.as_mut() {
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }

    let modules: Vec<utoipa::openapi::OpenApi> = vec![
        auth::ApiDoc::openapi(),
        users::ApiDoc::openapi(),
        ingredients::ApiDoc::openapi(),
        recipes::ApiDoc::openapi(),
        shopping_cart::ApiDoc::openapi(),
    ];

    for module_spec in modules {
        spec.paths.paths.extend(module_spec.paths.paths);

        if let Some(module_components) = module_spec.components {
            if let Some(spec_components) = spec.components.as_mut() {
                spec_components.schemas.extend(module_components.schemas);
            }
        }
    }

    spec
}
