//! Request extractors that validate before the handler runs.
//!
//! Both map every rejection into [`AppError::BadRequest`] so malformed input
//! gets the same error envelope as any other client error.

use std::fmt::Display;
use std::str::FromStr;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::errors::AppError;

/// Like `Json<T>`, but also runs `Validate::validate`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
            })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Like `Query<T>`, but also runs `Validate::validate`.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
            })?;

        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// Treats `null`, a missing field and `""` alike as absent.
pub fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct CancelBody {
        #[validate(length(min = 1, message = "bookingId is required"))]
        booking_id: String,
        #[serde(default, deserialize_with = "empty_string_as_none")]
        note: Option<String>,
    }

    async fn echo(ValidatedJson(body): ValidatedJson<CancelBody>) -> String {
        format!("{}:{}", body.booking_id, body.note.unwrap_or_else(|| "-".to_string()))
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Filter {
        #[serde(default, deserialize_with = "empty_string_as_none")]
        status: Option<String>,
    }

    async fn filter(ValidatedQuery(q): ValidatedQuery<Filter>) -> String {
        q.status.unwrap_or_else(|| "any".to_string())
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", post(echo))
            .route("/filter", get(filter))
    }

    async fn send(req: axum::http::Request<Body>) -> (StatusCode, String) {
        let res = app().oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn post_json(body: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_optional_string_is_absent() {
        let (status, body) = send(post_json(r#"{"bookingId":"b-1","note":""}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "b-1:-");

        let (_, body) = send(post_json(r#"{"bookingId":"b-1","note":null}"#)).await;
        assert_eq!(body, "b-1:-");

        let (_, body) = send(post_json(r#"{"bookingId":"b-1","note":"hi"}"#)).await;
        assert_eq!(body, "b-1:hi");
    }

    #[tokio::test]
    async fn test_validation_failure_is_bad_request() {
        let (status, body) = send(post_json(r#"{"bookingId":""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "bookingId is required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = send(post_json("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid request body"));

        let (status, _) = send(post_json(r#"{"note":"x"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_blank_status_means_any() {
        let req = axum::http::Request::builder()
            .uri("/filter?status=")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "any");
    }
}
