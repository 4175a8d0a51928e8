//! Rendering of gate outcomes as HTTP responses.

use axum_core::body::Body;
use axum_core::response::Response;
use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use turnstile::gate::{PaymentChallenge, RETRY_AFTER_SECS, RejectReason};

use crate::constants::CREDENTIAL_HEADER;

/// Builds the `402 Payment Required` response for a challenge.
#[must_use]
pub fn challenge_response(challenge: &PaymentChallenge) -> Response {
    json_response(StatusCode::PAYMENT_REQUIRED, challenge)
}

/// Builds the response for a rejected proof.
///
/// Retryable rejections carry a `Retry-After` header.
#[must_use]
pub fn rejection_response(reason: &RejectReason) -> Response {
    let status =
        StatusCode::from_u16(reason.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = json_response(status, &reason.body());
    if reason.is_retryable() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    }
    response
}

/// Attaches a freshly issued credential to a response.
pub fn attach_credential(response: &mut Response, token: &str) {
    match HeaderValue::from_str(token) {
        Ok(value) => {
            response.headers_mut().insert(CREDENTIAL_HEADER, value);
        }
        Err(_) => {
            #[cfg(feature = "telemetry")]
            tracing::error!("Issued credential is not a valid header value");
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let Ok(bytes) = serde_json::to_vec(body) else {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return response;
    };
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
