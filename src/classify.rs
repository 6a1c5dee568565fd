//! Maps raw transport outcomes onto classified [`OilPriceError`] variants.
//!
//! Only the statuses listed in [`classify_response`] and transport timeouts
//! are classified. Everything else comes back as `None` and the executor
//! surfaces it unmodified.

use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::{ApiResponse, OilPriceError, TransportError};

pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Classifies a non-success response.
///
/// | status | result |
/// |---|---|
/// | 401 | [`OilPriceError::Authentication`] |
/// | 404 | [`OilPriceError::NotFound`] |
/// | 422 | [`OilPriceError::Validation`] |
/// | 429 | [`OilPriceError::RateLimit`] |
/// | 5xx | [`OilPriceError::Server`] |
///
/// Returns `None` for any other status, including 2xx.
pub fn classify_response(response: &ApiResponse) -> Option<OilPriceError> {
    let body = serde_json::from_str::<JsonValue>(&response.body).ok();
    let message = |fallback: &str| {
        body.as_ref()
            .and_then(body_message)
            .unwrap_or_else(|| fallback.to_owned())
    };

    match response.status {
        401 => Some(OilPriceError::Authentication {
            message: message("invalid API key"),
        }),
        404 => Some(OilPriceError::NotFound {
            message: message("resource not found"),
            resource: body.as_ref().and_then(|body| {
                string_field(body, "commodity").or_else(|| string_field(body, "code"))
            }),
        }),
        422 => {
            let (field, reason) = body
                .as_ref()
                .map(validation_detail)
                .unwrap_or((None, None));
            Some(OilPriceError::Validation {
                field,
                reason: reason.unwrap_or_else(|| message("request validation failed")),
            })
        }
        429 => Some(OilPriceError::RateLimit {
            message: message("rate limit exceeded"),
            reset_at: response
                .header(RATE_LIMIT_RESET_HEADER)
                .and_then(parse_reset_at),
            limit: numeric_header(response, RATE_LIMIT_LIMIT_HEADER),
            remaining: numeric_header(response, RATE_LIMIT_REMAINING_HEADER),
        }),
        status @ 500..=599 => Some(OilPriceError::Server {
            status,
            message: message("server error"),
        }),
        _ => None,
    }
}

/// Classifies a transport failure. Only timeouts are classified.
pub fn classify_transport(err: &TransportError) -> Option<OilPriceError> {
    match err {
        TransportError::Timeout(timeout) => Some(OilPriceError::Timeout { timeout: *timeout }),
        TransportError::Connect(_) | TransportError::Other(_) => None,
    }
}

fn body_message(body: &JsonValue) -> Option<String> {
    string_field(body, "error").or_else(|| string_field(body, "message"))
}

fn string_field(body: &JsonValue, name: &str) -> Option<String> {
    body.get(name).and_then(JsonValue::as_str).map(str::to_owned)
}

/// Reads `{"field": .., "reason"|"message": ..}` or the first entry of an
/// `{"errors": {"field": ["reason", ..]}}` object.
fn validation_detail(body: &JsonValue) -> (Option<String>, Option<String>) {
    if let Some(field) = string_field(body, "field") {
        let reason = string_field(body, "reason").or_else(|| body_message(body));
        return (Some(field), reason);
    }

    let first = body
        .get("errors")
        .and_then(JsonValue::as_object)
        .and_then(|errors| errors.iter().next());
    match first {
        Some((field, detail)) => {
            let reason = match detail {
                JsonValue::String(reason) => Some(reason.clone()),
                JsonValue::Array(items) => {
                    items.first().and_then(JsonValue::as_str).map(str::to_owned)
                }
                _ => None,
            };
            (Some(field.clone()), reason)
        }
        None => (None, None),
    }
}

fn parse_reset_at(value: &str) -> Option<OffsetDateTime> {
    let seconds = value.trim().parse::<i64>().ok()?;
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

fn numeric_header(response: &ApiResponse, name: &str) -> Option<u64> {
    response.header(name)?.trim().parse().ok()
}
