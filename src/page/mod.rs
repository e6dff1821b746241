//! Pagination module
//!
//! Cursor-based pagination over paged HTTP resources.
//!
//! # Overview
//!
//! The page module provides:
//! - `Page` - one immutable page with forward/backward navigation, bulk
//!   materialization, and linear search across pages
//! - `PageOptions` - cursor/data field names and per-fetch request
//!   options
//! - `CursorInfo` - best-effort decoding of opaque cursor tokens
//!
//! Every navigation step performs exactly one pipeline call and returns
//! a brand-new page; the sequence ends when the server stops returning
//! a next cursor.

mod page;
mod types;

pub use page::{MapItem, Page};
pub use types::{decode_cursor, CursorInfo, PageOptions};
