//! HTTP pipeline module
//!
//! Resilient request/response pipeline for a multi-subdomain REST API.
//!
//! # Overview
//!
//! The http module provides:
//! - `HttpClient` - one logical call with transparent retry on rate
//!   limiting and stale anti-forgery tokens
//! - `ApiResponse` - uniform envelope for HTTP responses and transport
//!   failures
//! - `RequestObserver` / `LogMode` - per-phase observability hooks
//! - `Throttle` - optional client-side pacing

mod client;
mod response;
mod throttle;
mod types;

pub use client::HttpClient;
pub use response::{ApiErrorDetail, ApiResponse, TransportFailure, TransportFailureKind};
pub use throttle::{Throttle, ThrottleConfig};
pub use types::{
    HttpClientConfig, HttpClientConfigBuilder, LogMode, Phase, RequestBody, RequestDescriptor,
    RequestObserver, RequestOptions, CSRF_HEADER, RATELIMIT_RETRY_AFTER,
};
