//! Pagination types
//!
//! Page options and opaque-cursor decoding.

use crate::http::RequestOptions;
use crate::types::JsonValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Configuration for reading one paged resource.
///
/// The defaults match the wire format used across the API's paged
/// endpoints; individual resources override field names as needed.
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Query parameter carrying the cursor (default `cursor`)
    pub cursor_param: String,
    /// Body field holding the next-page cursor (default `nextPageCursor`)
    pub next_cursor_field: String,
    /// Body field holding the previous-page cursor (default
    /// `previousPageCursor`)
    pub prev_cursor_field: String,
    /// Body field holding the page's item array (default `data`)
    pub data_field: String,
    /// Best-effort decode of opaque cursors into structured metadata
    pub decode_cursors: bool,
    /// Request options applied to every page fetch
    pub request: RequestOptions,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            cursor_param: "cursor".to_string(),
            next_cursor_field: "nextPageCursor".to_string(),
            prev_cursor_field: "previousPageCursor".to_string(),
            data_field: "data".to_string(),
            decode_cursors: false,
            request: RequestOptions::default(),
        }
    }
}

impl PageOptions {
    /// Create options with the default field names
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the cursor query parameter name
    #[must_use]
    pub fn cursor_param(mut self, name: impl Into<String>) -> Self {
        self.cursor_param = name.into();
        self
    }

    /// Override the next-cursor body field
    #[must_use]
    pub fn next_cursor_field(mut self, name: impl Into<String>) -> Self {
        self.next_cursor_field = name.into();
        self
    }

    /// Override the previous-cursor body field
    #[must_use]
    pub fn prev_cursor_field(mut self, name: impl Into<String>) -> Self {
        self.prev_cursor_field = name.into();
        self
    }

    /// Override the item-array body field
    #[must_use]
    pub fn data_field(mut self, name: impl Into<String>) -> Self {
        self.data_field = name.into();
        self
    }

    /// Enable best-effort cursor decoding
    #[must_use]
    pub fn decode_cursors(mut self) -> Self {
        self.decode_cursors = true;
        self
    }

    /// Set the request options used for every page fetch
    #[must_use]
    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }
}

/// Structured metadata decoded from an opaque cursor.
///
/// Cursors are base64 text of a JSON payload followed by a newline and
/// a hash segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorInfo {
    /// The cursor's JSON payload (sort order, page number, key, ...)
    pub payload: JsonValue,
    /// Trailing integrity segment, when present
    pub hash: Option<String>,
}

/// Decode an opaque cursor, best-effort.
///
/// Returns `None` for cursors that are not base64, not UTF-8, or whose
/// payload is not JSON; decoding never fails a page fetch.
pub fn decode_cursor(cursor: &str) -> Option<CursorInfo> {
    let decoded = STANDARD.decode(cursor).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let mut segments = text.splitn(2, '\n');
    let payload: JsonValue = serde_json::from_str(segments.next()?).ok()?;
    let hash = segments.next().map(str::to_string);
    Some(CursorInfo { payload, hash })
}
