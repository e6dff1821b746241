//! HTTP pipeline types
//!
//! Request envelopes, logging modes, and the observability hook contract.

use crate::error::Result;
use crate::types::{Method, StringMap};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::throttle::ThrottleConfig;

/// Default wait before retrying a rate-limited call
pub const RATELIMIT_RETRY_AFTER: Duration = Duration::from_secs(15);

/// Default header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "x-csrf-token";

// ============================================================================
// Request Envelope
// ============================================================================

/// Request body payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Serialized to canonical JSON text before sending
    Json(Value),
    /// Sent as-is
    Text(String),
    /// Sent as-is, unserialized
    Binary(Bytes),
}

/// Configuration for a single call through the pipeline
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// Query parameters
    pub query: StringMap,
    /// Request headers, merged over the client-wide defaults
    pub headers: StringMap,
    /// Request body
    pub body: Option<RequestBody>,
    /// Bounded rate-limit retry budget; `None` retries without limit
    pub retry_limit: Option<u32>,
    /// Wait before a rate-limit retry; `None` disables that retry path
    pub retry_ratelimit_after: Option<Duration>,
    /// Treat any non-successful response as retryable
    pub always_retry: bool,
    /// Return the final response instead of an error when it is not
    /// successful
    pub dont_reject: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            query: StringMap::new(),
            headers: StringMap::new(),
            body: None,
            retry_limit: None,
            retry_ratelimit_after: Some(RATELIMIT_RETRY_AFTER),
            always_retry: false,
            dont_reject: false,
        }
    }
}

impl RequestOptions {
    /// Create new request options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Set a plain-text body
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Set a binary body
    #[must_use]
    pub fn binary(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Binary(body.into()));
        self
    }

    /// Bound the rate-limit retry budget
    #[must_use]
    pub fn retries(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    /// Override the rate-limit retry delay
    #[must_use]
    pub fn ratelimit_after(mut self, delay: Duration) -> Self {
        self.retry_ratelimit_after = Some(delay);
        self
    }

    /// Disable rate-limit retries entirely
    #[must_use]
    pub fn no_ratelimit_retry(mut self) -> Self {
        self.retry_ratelimit_after = None;
        self
    }

    /// Retry on any failure, not just rate limiting
    #[must_use]
    pub fn always_retry(mut self) -> Self {
        self.always_retry = true;
        self
    }

    /// Suppress the final error for non-successful responses
    #[must_use]
    pub fn dont_reject(mut self) -> Self {
        self.dont_reject = true;
        self
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Pipeline phase an observability event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// About to hit the transport
    BeforeSend,
    /// A retry-triggering condition was observed
    Retry,
    /// The final response for this logical call is in
    Complete,
}

/// Which phases fire observability events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Only before the transport call
    BeforeSend,
    /// Retry and completion events
    #[default]
    AfterResponse,
    /// Only the final completion event
    AfterComplete,
    /// Every phase
    Both,
}

impl LogMode {
    /// Check whether this mode fires events for the given phase
    pub fn fires(&self, phase: Phase) -> bool {
        match phase {
            Phase::BeforeSend => matches!(self, Self::BeforeSend | Self::Both),
            Phase::Retry => matches!(self, Self::AfterResponse | Self::Both),
            Phase::Complete => {
                matches!(self, Self::AfterResponse | Self::AfterComplete | Self::Both)
            }
        }
    }
}

/// Snapshot of one attempt, handed to the observability hook.
///
/// Before the send, `status` and `status_text` are unset; retry and
/// completion events carry the response that triggered them.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Headers as merged for this attempt
    pub headers: StringMap,
    /// 1-based attempt counter within the logical call
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub status: Option<i32>,
    pub status_text: Option<String>,
}

impl RequestDescriptor {
    /// Copy of this descriptor annotated with a response outcome
    #[must_use]
    pub fn with_status(&self, status: i32, status_text: impl Into<String>) -> Self {
        let mut descriptor = self.clone();
        descriptor.status = Some(status);
        descriptor.status_text = Some(status_text.into());
        descriptor
    }
}

/// Observability hook invoked per phase per attempt.
///
/// Errors returned here are logged and ignored; a broken observer never
/// breaks a request.
#[async_trait]
pub trait RequestObserver: Send + Sync {
    async fn on_event(&self, phase: Phase, request: &RequestDescriptor) -> Result<()>;
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the HTTP pipeline
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base domain for subdomain URL building (e.g. "example.com")
    pub base_domain: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Client-wide default headers
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
    /// Header carrying the anti-forgery token
    pub csrf_header: String,
    /// Cap on consecutive stale-token retries per logical call
    pub token_retry_limit: u32,
    /// Whether observability events fire at all
    pub logging_enabled: bool,
    /// Which phases fire observability events
    pub log_mode: LogMode,
    /// Optional client-side pacing
    pub throttle: Option<ThrottleConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = StringMap::new();
        default_headers.insert("content-type".to_string(), "application/json".to_string());
        default_headers.insert("accept".to_string(), "application/json".to_string());
        Self {
            base_domain: None,
            timeout: Duration::from_secs(30),
            default_headers,
            user_agent: format!("apikit/{}", env!("CARGO_PKG_VERSION")),
            csrf_header: CSRF_HEADER.to_string(),
            token_retry_limit: 3,
            logging_enabled: false,
            log_mode: LogMode::default(),
            throttle: None,
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base domain for subdomain URL building
    pub fn base_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.base_domain = Some(domain.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Override the anti-forgery token header name
    pub fn csrf_header(mut self, name: impl Into<String>) -> Self {
        self.config.csrf_header = name.into();
        self
    }

    /// Cap consecutive stale-token retries
    pub fn token_retry_limit(mut self, limit: u32) -> Self {
        self.config.token_retry_limit = limit;
        self
    }

    /// Enable observability events with the given mode
    pub fn logging(mut self, mode: LogMode) -> Self {
        self.config.logging_enabled = true;
        self.config.log_mode = mode;
        self
    }

    /// Enable client-side pacing
    pub fn throttle(mut self, config: ThrottleConfig) -> Self {
        self.config.throttle = Some(config);
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
