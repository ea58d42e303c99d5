use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::domain::Platform;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Classification of a venue-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Request throttled; retry with backoff.
    RateLimit,
    /// IP blocked or WAF rejection. Trading must halt for the account.
    IpBanned,
    /// Invalid key, signature or permission. Trading must halt for the account.
    Auth,
    /// Signed timestamp outside the venue's tolerance window.
    TimestampExpired,
    Other,
}

const RATE_LIMIT_CODES: &[i64] = &[-1015];
const IP_BAN_CODES: &[i64] = &[-1003, -1010];
const AUTH_CODES: &[i64] = &[-2015, -2010];
// Binance -1021, Bitget 40008, OKX 50102
const TIMESTAMP_CODES: &[i64] = &[-1021, 40008, 50102];

/// Error returned by a venue, preserved verbatim for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub platform: Platform,
    /// HTTP status, or 200 for body-level failures.
    pub status: u16,
    /// Venue error code as sent (numeric or string).
    pub code: String,
    pub message: String,
    pub raw_body: String,
}

impl ApiError {
    #[must_use]
    pub fn new(
        platform: Platform,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            status,
            code: code.into(),
            message: message.into(),
            raw_body: String::new(),
        }
    }

    /// Parse a venue error body.
    ///
    /// Reads `code` (number or string), `msg`, `message` and Gate's `label`.
    /// Falls back to the raw body as the message when nothing is recognized.
    #[must_use]
    pub fn from_response(platform: Platform, status: u16, body: &str) -> Self {
        let mut err = Self {
            platform,
            status,
            code: String::new(),
            message: body.to_string(),
            raw_body: body.to_string(),
        };

        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return err;
        };

        match json.get("code") {
            Some(Value::Number(n)) => err.code = n.to_string(),
            Some(Value::String(s)) => err.code = s.clone(),
            _ => {}
        }

        let message = json
            .get("msg")
            .and_then(Value::as_str)
            .or_else(|| json.get("message").and_then(Value::as_str));
        if let Some(message) = message {
            err.message = message.to_string();
        }

        if let Some(label) = json.get("label").and_then(Value::as_str) {
            let label = label.trim();
            if !label.is_empty() && !err.message.to_uppercase().contains(&label.to_uppercase()) {
                err.message = format!("{label}: {}", err.message);
            }
            if err.code.is_empty() {
                err.code = label.to_string();
            }
        }

        err
    }

    /// Venue code as an integer, when numeric.
    #[must_use]
    pub fn numeric_code(&self) -> Option<i64> {
        self.code.trim().parse().ok()
    }

    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        if self.is_timestamp_expired() {
            ApiErrorKind::TimestampExpired
        } else if self.is_rate_limit() {
            ApiErrorKind::RateLimit
        } else if self.is_ip_banned() {
            ApiErrorKind::IpBanned
        } else if self.is_auth_error() {
            ApiErrorKind::Auth
        } else {
            ApiErrorKind::Other
        }
    }

    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        if self.status == 429 || self.code_in(RATE_LIMIT_CODES) {
            return true;
        }
        self.message_contains(&["rate limit", "too many", "request limit", "请求过于频繁"])
    }

    #[must_use]
    pub fn is_ip_banned(&self) -> bool {
        if self.status == 403 || self.status == 418 || self.code_in(IP_BAN_CODES) {
            return true;
        }
        self.message_contains(&["ip ban", "ip blocked", "waf", "forbidden"])
    }

    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        if self.status == 401 || self.code_in(AUTH_CODES) {
            return true;
        }
        self.message_contains(&["api key", "signature", "unauthorized"])
    }

    #[must_use]
    pub fn is_timestamp_expired(&self) -> bool {
        if self.code_in(TIMESTAMP_CODES) {
            return true;
        }
        self.message_contains(&[
            "timestamp request expired",
            "timestamp expired",
            "outside of the recvwindow",
            "请求时间戳过期",
        ])
    }

    /// IP bans and credential failures require operator intervention.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.is_ip_banned() || self.is_auth_error()
    }

    fn code_in(&self, codes: &[i64]) -> bool {
        self.numeric_code().is_some_and(|code| codes.contains(&code))
    }

    fn message_contains(&self, needles: &[&str]) -> bool {
        let lower = self.message.to_lowercase();
        needles.iter().any(|needle| lower.contains(needle))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] status={} code={} {}",
            self.platform, self.status, self.code, self.message
        )
    }
}

impl std::error::Error for ApiError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Request rejected locally, never sent over the wire.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limit wait exceeded: needed {needed_ms}ms, max {max_wait_ms}ms")]
    RateLimitExceeded { needed_ms: u64, max_wait_ms: u64 },

    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Explicitly marked as transient by the caller.
    #[error("retryable: {0}")]
    Retryable(#[source] Box<Error>),

    /// The account cannot keep trading until an operator steps in.
    #[error("fatal: {0}")]
    Fatal(#[source] Box<Error>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("not connected")]
    NotConnected,

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl Error {
    /// Mark an error as transient so the retry executor will retry it.
    #[must_use]
    pub fn retryable(err: Error) -> Self {
        Error::Retryable(Box::new(err))
    }

    /// The venue error behind this error, looking through retry wrappers.
    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            Error::Retryable(inner)
            | Error::Fatal(inner)
            | Error::RetriesExhausted { source: inner, .. } => inner.api(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timestamp_expired(&self) -> bool {
        self.api().is_some_and(ApiError::is_timestamp_expired)
    }

    /// Escalate an error so [`Error::is_fatal`] reports it.
    #[must_use]
    pub fn fatal(err: Error) -> Self {
        match err {
            Error::Fatal(_) => err,
            other => Error::Fatal(Box::new(other)),
        }
    }

    /// IP bans, auth failures and escalated errors: the owning engine should
    /// stop trading the account.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_)) || self.api().is_some_and(ApiError::is_critical)
    }
}
