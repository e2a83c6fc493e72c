mod api;
mod auth;
mod composition;
mod config;
mod db;
mod error;
mod ingredient_loader;
mod media;
mod memberships;
mod models;
mod raw_sql;
mod schema;
mod shopping_list;
mod telemetry;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, FromRef, MatchedPath};
use axum::http::Request;
use axum::Router;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::Span;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::db::DbPool;

/// JSON bodies may carry a base64 image, which is about a third larger than the file.
const JSON_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<DbPool>,
    pub config: Arc<Config>,
}

impl FromRef<AppState> for Arc<DbPool> {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

#[derive(Parser)]
#[command(name = "foodgram-server", about = "Recipe sharing API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Load the ingredient catalog from a JSON file
    LoadIngredients {
        /// Path to the JSON file (defaults to INGREDIENTS_PATH)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the OpenAPI document and exit
    Openapi,
}

fn app(state: AppState) -> Router {
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::openapi());
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .nest("/api/auth", api::auth::router())
        .nest("/api/users", api::users::router())
        .nest("/api/ingredients", api::ingredients::router())
        .nest("/api/recipes", api::recipes::router())
        .nest("/api/shopping_cart", api::shopping_cart::router())
        .nest_service("/media", media)
        .merge(swagger_ui)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());

                    // Static files are noisy; keep them out of the info log
                    if matched_path.starts_with("/media") {
                        tracing::trace_span!("http_request")
                    } else {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %matched_path,
                        )
                    }
                })
                .on_request(|_request: &Request<_>, _span: &Span| {})
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        if span.metadata().map(|m| m.level()) == Some(&tracing::Level::TRACE) {
                            return;
                        }
                        let status = response.status().as_u16();
                        if status >= 500 {
                            tracing::error!(
                                status = %status,
                                latency_ms = %latency.as_millis(),
                                "request failed with server error"
                            );
                        } else {
                            tracing::info!(
                                status = %status,
                                latency_ms = %latency.as_millis(),
                                "request completed"
                            );
                        }
                    },
                )
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     latency: std::time::Duration,
                     _span: &Span| {
                        tracing::error!(
                            error = %error,
                            latency_ms = %latency.as_millis(),
                            "request failed"
                        );
                    },
                ),
        )
}

async fn serve(config: Config) -> Result<()> {
    let pool = db::create_pool(&config.database_url)?;

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("Failed to create media root {}", config.media_root.display()))?;

    let bind_address = config.bind_address.clone();
    let public_base_url = config.public_base_url.clone();

    let state = AppState {
        pool: Arc::new(pool),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    tracing::info!("Server listening on {}", listener.local_addr()?);
    tracing::info!("Swagger UI available at {}/swagger-ui/", public_base_url);
    tracing::info!(
        "OpenAPI spec available at {}/api-docs/openapi.json",
        public_base_url
    );

    axum::serve(listener, app(state))
        .await
        .context("Server error")
}

fn load_ingredients(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| config.ingredients_path.clone());
    let pool = db::create_pool(&config.database_url)?;
    let mut conn = pool.get().context("Failed to get DB connection")?;

    let created = ingredient_loader::run(&mut conn, &path)?;
    println!("Loaded {created} ingredients from {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Openapi) = cli.command {
        println!("{}", api::openapi().to_pretty_json()?);
        return Ok(());
    }

    // A missing .env file is fine; the environment may already be set
    dotenvy::dotenv().ok();
    telemetry::init_telemetry();

    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::LoadIngredients { path } => load_ingredients(&config, path),
        Command::Openapi => Ok(()),
    }
}
