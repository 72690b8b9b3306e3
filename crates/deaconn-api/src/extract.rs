//! Body, query and path extractors whose rejections render as [`ApiError`]
//! banners instead of axum's plain-text defaults.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON request body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Query string. Unknown sort keys fail here.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        #[allow(dead_code)]
        email: String,
        #[allow(dead_code)]
        password: String,
    }

    #[tokio::test]
    async fn missing_field_is_a_bad_request() {
        let req = axum::http::Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"email":"x@example.com"}"#))
            .unwrap();

        let err = match ApiJson::<Login>::from_request(req, &()).await {
            Ok(_) => panic!("incomplete body accepted"),
            Err(err) => err,
        };
        assert!(matches!(&err, ApiError::BadRequest(msg) if msg.contains("password")));
    }

    #[tokio::test]
    async fn malformed_query_is_a_bad_request() {
        let req = axum::http::Request::builder().uri("/?limit=ten").body(()).unwrap();
        let (mut parts, _) = req.into_parts();

        #[derive(Debug, Deserialize)]
        struct Page {
            #[allow(dead_code)]
            limit: u32,
        }
        let result = ApiQuery::<Page>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let status = match result {
            Err(err) => axum::response::IntoResponse::into_response(err).status(),
            Ok(_) => StatusCode::OK,
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
