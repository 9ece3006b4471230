use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::BucketKind;
use crate::Reply;

/// Errors produced by the admission boundary.
///
/// The `Display` text of each variant is the message sent back to the client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThrottleError {
    /// An admission call arrived before the bucket was configured.
    ///
    /// Converts to `400 Bad Request` with a reported level of 0.
    #[error("{} not configured. Please configure it first.", .kind.name())]
    NotConfigured { kind: BucketKind },

    /// The bucket rejected the request.
    ///
    /// Converts to `429 Too Many Requests` with a `Retry-After` header.
    #[error("Too Many Requests. Please try again later.")]
    RateLimited {
        kind: BucketKind,
        /// The level observed by the rejected check.
        level: u64,
        /// The duration to wait before retrying.
        retry_after: Duration,
    },

    /// The configuration call lacked `capacity` or the rate parameter.
    #[error("Missing 'capacity' or '{}' parameters.", .kind.rate_param())]
    MissingParameters { kind: BucketKind },

    /// A configuration parameter was not an integer.
    #[error("Invalid 'capacity' or '{}' format. Must be numbers.", .kind.rate_param())]
    InvalidFormat { kind: BucketKind },

    /// A configuration parameter was zero or negative.
    #[error("Invalid 'capacity' or '{}' value. Must be valid positive numbers.", .kind.rate_param())]
    InvalidValue { kind: BucketKind },
}

impl IntoResponse for ThrottleError {
    fn into_response(self) -> Response {
        let reply = Reply::error(self.to_string());

        match self {
            Self::NotConfigured { kind } => {
                (StatusCode::BAD_REQUEST, reply.with(kind.level_field(), 0)).into_response()
            }
            Self::RateLimited {
                kind,
                level,
                retry_after,
            } => {
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    reply.with(kind.level_field(), level),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            Self::MissingParameters { .. }
            | Self::InvalidFormat { .. }
            | Self::InvalidValue { .. } => (StatusCode::BAD_REQUEST, reply).into_response(),
        }
    }
}
