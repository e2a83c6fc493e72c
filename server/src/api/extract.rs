//! Request extractors whose rejections render as `ApiError` JSON instead of
//! axum's plain-text defaults.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body. Malformed or incomplete bodies are a 400 `{"error": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string parameters, rejected the same way as [`ApiJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters, rejected the same way as [`ApiJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::recipes::create::CreateRecipeRequest;
    use crate::api::users::subscriptions::SubscriptionsParams;
    use crate::error::ValidationError;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/recipes")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_recipe_body_without_ingredients_is_json_bad_request() {
        let request = json_request(
            r#"{"image":"data:image/png;base64,AA==","title":"Soup","description":"Hot","preparation_time":10}"#,
        );

        let err = ApiJson::<CreateRecipeRequest>::from_request(request, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidField { field: "body", .. })
        ));

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("ingredients"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_json_bad_request() {
        let request = json_request("{not json");

        let err = ApiJson::<CreateRecipeRequest>::from_request(request, &())
            .await
            .err()
            .unwrap();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_json_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/recipes")
            .body(Body::from("{}"))
            .unwrap();

        let err = ApiJson::<CreateRecipeRequest>::from_request(request, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_negative_recipes_limit_is_json_bad_request() {
        let (mut parts, _) = Request::builder()
            .uri("/api/users/subscriptions?recipes_limit=-1")
            .body(())
            .unwrap()
            .into_parts();

        let err = ApiQuery::<SubscriptionsParams>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidField { field: "query", .. })
        ));

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("query: "));
    }

    #[tokio::test]
    async fn test_valid_query_passes_through() {
        let (mut parts, _) = Request::builder()
            .uri("/api/users/subscriptions?limit=5&recipes_limit=2")
            .body(())
            .unwrap()
            .into_parts();

        let ApiQuery(params) = ApiQuery::<SubscriptionsParams>::from_request_parts(&mut parts, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.recipes_limit, Some(2));
    }
}
