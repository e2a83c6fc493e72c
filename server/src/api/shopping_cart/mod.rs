pub mod list;

use crate::AppState;
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

/// Returns the router for /api/shopping_cart endpoints (mounted at /api/shopping_cart)
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list::list_cart))
}

#[derive(OpenApi)]
#[openapi(
    paths(list::list_cart),
    components(schemas(list::CartEntry, list::CartResponse))
)]
pub struct ApiDoc;
