//! Resilient HTTP pipeline
//!
//! One logical call through [`HttpClient::call`] transparently retries on
//! rate limiting and on stale anti-forgery tokens, captures transport
//! failures as response state, and emits per-phase observability events.
//! Callers only ever see the final outcome.

use super::response::ApiResponse;
use super::throttle::Throttle;
use super::types::{
    HttpClientConfig, Phase, RequestBody, RequestDescriptor, RequestObserver, RequestOptions,
};
use crate::error::Result;
use crate::types::{Method, StringMap};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// HTTP pipeline with transparent retry and shared default headers.
///
/// Cheap to clone; clones share the default-header cell (including the
/// anti-forgery token), so a token refreshed during one call is read by
/// every subsequent call on any clone.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpClientConfig,
    default_headers: Arc<RwLock<StringMap>>,
    observer: Option<Arc<dyn RequestObserver>>,
    throttle: Option<Throttle>,
}

impl HttpClient {
    /// Create a pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a pipeline with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        let throttle = config.throttle.map(Throttle::new);
        let default_headers = Arc::new(RwLock::new(config.default_headers.clone()));

        Self {
            client,
            config,
            default_headers,
            observer: None,
            throttle,
        }
    }

    /// Attach an observability hook
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Read a client-wide default header
    pub async fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers.read().await.get(name).cloned()
    }

    /// Set a client-wide default header, visible to every clone
    pub async fn set_default_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.default_headers
            .write()
            .await
            .insert(name.into(), value.into());
    }

    /// Build a URL under a subdomain of the configured base domain.
    ///
    /// An empty subdomain addresses the bare domain itself.
    pub fn subdomain_url(&self, subdomain: &str, path: &str) -> String {
        let base = self.config.base_domain.as_deref().unwrap_or_default();
        let separator = if path.starts_with('/') { "" } else { "/" };
        if subdomain.is_empty() {
            format!("https://{base}{separator}{path}")
        } else {
            format!("https://{subdomain}.{base}{separator}{path}")
        }
    }

    /// Make a GET call with default options
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.call(url, RequestOptions::default()).await
    }

    /// Make a POST call with a JSON body
    pub async fn post(&self, url: &str, body: Value) -> Result<ApiResponse> {
        self.call(url, RequestOptions::new().method(Method::POST).json(body))
            .await
    }

    /// Perform one logical call.
    ///
    /// Rate-limited responses (and, with `always_retry`, any failure, and
    /// transient DNS failures) are retried after the configured delay
    /// while the retry budget lasts. A forbidden response carrying a
    /// fresh anti-forgery token stores the token into the shared default
    /// headers and retries without touching the budget, up to the
    /// configured cap. Anything else completes the call: successful
    /// responses are returned, failures become
    /// [`Error::Request`](crate::error::Error::Request) unless
    /// `dont_reject` is set.
    pub async fn call(&self, url: &str, options: RequestOptions) -> Result<ApiResponse> {
        let mut budget = options.retry_limit;
        let mut token_retries = 0u32;
        let mut attempt = 1u32;

        loop {
            if let Some(throttle) = &self.throttle {
                throttle.acquire().await;
            }

            let mut headers = self.default_headers.read().await.clone();
            for (key, value) in &options.headers {
                headers.insert(key.clone(), value.clone());
            }

            let descriptor = RequestDescriptor {
                method: options.method,
                url: url.to_string(),
                headers: headers.clone(),
                attempt,
                started_at: Utc::now(),
                status: None,
                status_text: None,
            };
            self.emit(Phase::BeforeSend, &descriptor).await;

            let response = self.perform(url, &options, &headers).await;
            let outcome = descriptor.with_status(response.status, response.status_text.clone());

            let transient_dns = response
                .transport_failure
                .as_ref()
                .is_some_and(super::response::TransportFailure::is_transient);
            let rate_retryable = response.is_rate_limited()
                || (options.always_retry && !response.ok)
                || transient_dns;

            if rate_retryable {
                if let Some(delay) = options.retry_ratelimit_after {
                    if budget != Some(0) {
                        self.emit(Phase::Retry, &outcome).await;
                        warn!(
                            status = response.status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retryable failure, waiting before next attempt"
                        );
                        tokio::time::sleep(delay).await;
                        if let Some(remaining) = budget.as_mut() {
                            *remaining -= 1;
                        }
                        attempt += 1;
                        continue;
                    }
                }
            } else if response.status == 403 {
                if let Some(fresh) = response.header(&self.config.csrf_header) {
                    if token_retries < self.config.token_retry_limit {
                        self.emit(Phase::Retry, &outcome).await;
                        debug!(attempt, "anti-forgery token refreshed, retrying");
                        self.set_default_header(self.config.csrf_header.clone(), fresh)
                            .await;
                        token_retries += 1;
                        attempt += 1;
                        continue;
                    }
                }
            }

            self.emit(Phase::Complete, &outcome).await;

            if !response.ok && !options.dont_reject {
                return Err(response.into_error());
            }
            debug!(status = response.status, %url, "call complete");
            return Ok(response);
        }
    }

    /// One transport attempt; failures below the HTTP layer come back as
    /// response state
    async fn perform(
        &self,
        url: &str,
        options: &RequestOptions,
        headers: &StringMap,
    ) -> ApiResponse {
        let mut builder = self.client.request(options.method.into(), url);
        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        builder = match &options.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Binary(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        let request = match builder.build() {
            Ok(request) => request,
            Err(err) => return ApiResponse::from_transport_failure(options.method, url, &err),
        };
        let sent_url = request.url().to_string();

        match self.client.execute(request).await {
            Ok(res) => {
                let status = res.status();
                let final_url = res.url().to_string();
                let redirected_to = (final_url != sent_url).then_some(final_url);
                let response_headers: StringMap = res
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.as_str().to_string(), v.to_string()))
                    })
                    .collect();
                match res.text().await {
                    Ok(body) => ApiResponse::from_http(
                        options.method,
                        url,
                        status,
                        response_headers,
                        body,
                        redirected_to,
                    ),
                    Err(err) => ApiResponse::from_transport_failure(options.method, url, &err),
                }
            }
            Err(err) => ApiResponse::from_transport_failure(options.method, url, &err),
        }
    }

    /// Fire the observability hook for a phase, if configured to.
    ///
    /// Hook failures are logged and swallowed so a broken observer never
    /// breaks a request.
    async fn emit(&self, phase: Phase, descriptor: &RequestDescriptor) {
        let Some(observer) = &self.observer else {
            return;
        };
        if !self.config.logging_enabled || !self.config.log_mode.fires(phase) {
            return;
        }
        if let Err(err) = observer.on_event(phase, descriptor).await {
            warn!(%err, ?phase, "request observer failed");
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_observer", &self.observer.is_some())
            .field("has_throttle", &self.throttle.is_some())
            .finish_non_exhaustive()
    }
}
