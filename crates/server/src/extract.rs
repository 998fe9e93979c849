use axum::body::Body;
use serde::de::DeserializeOwned;

use crate::error::RelayError;

pub(crate) const BODY_LIMIT_BYTES: usize = 10 << 20; // 10 MiB

/// JSON body extractor reporting failures in the relay's own error format,
/// instead of axum's plain-text rejections.
pub(crate) struct Extract<T>(pub T);

impl<S, T: DeserializeOwned> axum::extract::FromRequest<S> for Extract<T>
where
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request(request: http::Request<Body>, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = request.into_parts();

        let is_json = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));

        if !is_json {
            return Err(RelayError::BadRequest(
                "Unsupported Content-Type, expected: 'Content-Type: application/json'".to_string(),
            ));
        }

        let bytes = axum::body::to_bytes(body, BODY_LIMIT_BYTES).await.map_err(|err| {
            let too_large = std::error::Error::source(&err).is_some_and(|source| source.is::<http_body_util::LengthLimitError>());

            if too_large {
                RelayError::BadRequest(format!("Request body is too large, limit is {BODY_LIMIT_BYTES} bytes"))
            } else {
                RelayError::BadRequest(format!("Failed to read request body: {err}"))
            }
        })?;

        let body = serde_json::from_slice(&bytes)
            .map_err(|err| RelayError::BadRequest(format!("Failed to parse request body: {err}")))?;

        Ok(Extract(body))
    }
}
