pub mod avatar;
pub mod create;
pub mod get;
pub mod list;
pub mod me;
pub mod set_password;
pub mod subscribe;
pub mod subscriptions;
pub mod view;

use crate::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use utoipa::OpenApi;

/// Returns the router for /api/users endpoints (mounted at /api/users)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_users).post(create::create_user))
        .route("/me", get(me::get_me))
        .route(
            "/me/avatar",
            put(avatar::put_avatar).delete(avatar::delete_avatar),
        )
        .route("/set_password", post(set_password::set_password))
        .route("/subscriptions", get(subscriptions::list_subscriptions))
        .route("/{id}", get(get::get_user))
        .route(
            "/{id}/subscribe",
            post(subscribe::subscribe).delete(subscribe::unsubscribe),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create::create_user,
        list::list_users,
        get::get_user,
        me::get_me,
        set_password::set_password,
        avatar::put_avatar,
        avatar::delete_avatar,
        subscribe::subscribe,
        subscribe::unsubscribe,
        subscriptions::list_subscriptions,
    ),
    components(schemas(
        create::SignupRequest,
        create::SignupResponse,
        list::ListUsersResponse,
        view::UserResponse,
        view::AuthorWithRecipes,
        set_password::SetPasswordRequest,
        avatar::AvatarRequest,
        avatar::AvatarResponse,
        subscriptions::SubscriptionsResponse,
    ))
)]
pub struct ApiDoc;
