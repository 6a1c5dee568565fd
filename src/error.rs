use std::time::Duration;

use time::OffsetDateTime;

use crate::RetryPolicy;

/// Error type returned by this crate.
///
/// The first seven variants are *classified*: they carry a [`OutcomeKind`]
/// and are the only failures a [`RetryPolicy`] can retry or that
/// [`PartialFailure::Collect`](crate::PartialFailure::Collect) can absorb.
/// The remaining variants are surfaced verbatim and never retried.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OilPriceError {
    /// Invalid client configuration or missing credential.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The API rejected the credential (HTTP 401).
    #[error("[401] {message}")]
    Authentication { message: String },
    /// The API rate limit was exceeded (HTTP 429).
    #[error("[429] {message}")]
    RateLimit {
        message: String,
        /// When the current rate-limit window resets, if the API said so.
        reset_at: Option<OffsetDateTime>,
        /// Requests allowed per window.
        limit: Option<u64>,
        /// Requests left in the current window.
        remaining: Option<u64>,
    },
    /// The requested commodity or resource does not exist (HTTP 404).
    #[error("[404] {message}")]
    NotFound {
        message: String,
        /// Commodity code or resource name reported by the API.
        resource: Option<String>,
    },
    /// Request parameters were rejected (HTTP 422) or failed local checks.
    #[error("[422] validation failed: {reason}")]
    Validation {
        /// Offending field, when known.
        field: Option<String>,
        reason: String,
    },
    /// The API failed with a 5xx status.
    #[error("[{status}] {message}")]
    Server { status: u16, message: String },
    /// A single attempt exceeded its timeout.
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    /// Non-success HTTP status with no classification.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Transport failure other than a timeout.
    #[error("transport error: {0}")]
    Transport(TransportError),
    /// Response decoding or shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure of a single HTTP exchange, before any classification.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Tag of a classified [`OilPriceError`], used to configure retry behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutcomeKind {
    Configuration,
    Authentication,
    RateLimit,
    NotFound,
    Validation,
    Server,
    Timeout,
}

impl OilPriceError {
    /// Returns the classification of this error, or `None` for failures
    /// that are surfaced verbatim.
    pub fn kind(&self) -> Option<OutcomeKind> {
        match self {
            Self::Configuration(_) => Some(OutcomeKind::Configuration),
            Self::Authentication { .. } => Some(OutcomeKind::Authentication),
            Self::RateLimit { .. } => Some(OutcomeKind::RateLimit),
            Self::NotFound { .. } => Some(OutcomeKind::NotFound),
            Self::Validation { .. } => Some(OutcomeKind::Validation),
            Self::Server { .. } => Some(OutcomeKind::Server),
            Self::Timeout { .. } => Some(OutcomeKind::Timeout),
            Self::Http { .. } | Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.kind().is_some()
    }

    /// Whether `policy` would retry this error on a non-final attempt.
    pub fn is_retryable_by(&self, policy: &RetryPolicy) -> bool {
        self.kind()
            .is_some_and(|kind| policy.retryable.contains(&kind))
    }

    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::RateLimit { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::Validation { .. } => Some(422),
            Self::Server { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Seconds until the rate-limit window resets, relative to `now`.
    pub fn seconds_until_reset(&self, now: OffsetDateTime) -> Option<i64> {
        match self {
            Self::RateLimit {
                reset_at: Some(reset_at),
                ..
            } => Some((*reset_at - now).whole_seconds()),
            _ => None,
        }
    }

    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.to_owned()),
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for OilPriceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(timeout) => Self::Timeout { timeout },
            other => Self::Transport(other),
        }
    }
}
