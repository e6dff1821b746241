//! # apikit
//!
//! A minimal, Rust-native runtime core for building client SDKs against
//! large, versioned, multi-subdomain REST APIs.
//!
//! ## Features
//!
//! - **Identity caching**: deduplicate remote objects by id, with
//!   partial-to-full representation upgrades and strong / soft-weak /
//!   hard-weak storage policies
//! - **Resilient requests**: one logical call that transparently rides
//!   out rate limiting and stale anti-forgery tokens
//! - **Cursor pagination**: lazy, revisitable page sequences with bulk
//!   materialization and cross-page search
//! - **Observability**: per-phase request hooks gated by a logging mode
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apikit::http::{HttpClient, HttpClientConfig};
//! use apikit::page::{Page, PageOptions};
//! use apikit::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = HttpClient::with_config(
//!         HttpClientConfig::builder().base_domain("example.com").build(),
//!     );
//!
//!     // One resilient call.
//!     let me = client.get(&client.subdomain_url("users", "/v1/me")).await?;
//!
//!     // Walk a paged resource.
//!     let page = Page::first(
//!         &client.subdomain_url("users", "/v1/users/1/badges"),
//!         &client,
//!         PageOptions::default(),
//!         |item| Ok(item.clone()),
//!     )
//!     .await?;
//!     let all = page.fetch_all_page_data().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Typed accessors (callers)                  │
//! │        users, assets, groups, messages, ... wrappers        │
//! └─────────────────────────────────────────────────────────────┘
//!                │                │                │
//! ┌──────────────┴───┬────────────┴─────┬──────────┴───────────┐
//! │      Cache       │       Http       │         Page         │
//! ├──────────────────┼──────────────────┼──────────────────────┤
//! │ Identity upgrade │ Rate-limit retry │ Cursor navigation    │
//! │ Soft/hard weak   │ Token refresh    │ Bulk materialization │
//! │ Periodic sweep   │ Observability    │ Cursor decoding      │
//! └──────────────────┴──────────────────┴──────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Add docs before 1.0 release

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Common types and type aliases
pub mod types;

/// Identity cache with priority-based upgrades and weak storage
pub mod cache;

/// Resilient HTTP pipeline
pub mod http;

/// Cursor-based pagination
pub mod page;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use cache::{Entity, EntityCtor, IdentityCache, StoragePolicy};
pub use http::{ApiResponse, HttpClient, HttpClientConfig, RequestOptions};
pub use page::{Page, PageOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
