//! API middleware

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::info;

use core_kernel::OperationMetadata;

use crate::error::ApiError;

/// Header naming the caller recorded in the audit trail
pub const ACTOR_HEADER: &str = "x-actor";

/// Header carrying the request id set by the request-id layer
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const SOURCE_SYSTEM: &str = "numbering-api";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Audit logging middleware
///
/// Logs all API requests with the caller and outcome
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let actor = header_value(request.headers(), ACTOR_HEADER)
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        actor = %actor,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}

/// Operation metadata taken from the request headers
///
/// Handlers that mutate a series pass this on so the audit event names
/// the caller.
#[derive(Debug, Clone)]
pub struct RequestMetadata(pub OperationMetadata);

#[async_trait]
impl<S> FromRequestParts<S> for RequestMetadata
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestMetadata(OperationMetadata {
            correlation_id: header_value(&parts.headers, REQUEST_ID_HEADER),
            initiated_by: header_value(&parts.headers, ACTOR_HEADER),
            source_system: Some(SOURCE_SYSTEM.to_string()),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metadata_reads_actor_and_request_id() {
        let request = Request::builder()
            .header(ACTOR_HEADER, "ops@dealer")
            .header(REQUEST_ID_HEADER, "req-42")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let RequestMetadata(metadata) = RequestMetadata::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(metadata.actor(), "ops@dealer");
        assert_eq!(metadata.correlation_id.as_deref(), Some("req-42"));
        assert_eq!(metadata.source_system.as_deref(), Some("numbering-api"));
    }

    #[tokio::test]
    async fn test_blank_actor_defaults_to_system() {
        let request = Request::builder()
            .header(ACTOR_HEADER, "   ")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let RequestMetadata(metadata) = RequestMetadata::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(metadata.actor(), "system");
    }
}
