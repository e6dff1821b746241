//! Cursor-paged resource navigation
//!
//! Wraps one pipeline call per page, turning a cursor-delimited resource
//! into a navigable, lazily fetched sequence. A page never mutates:
//! navigation always produces a brand-new page object.

use super::types::{decode_cursor, CursorInfo, PageOptions};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::types::JsonValue;
use futures::Stream;
use std::sync::Arc;
use url::Url;

/// Item mapping applied to every entry of a fetched page.
///
/// This is where raw JSON becomes identity-stable entity instances; a
/// typed accessor usually passes a closure that routes each item through
/// its identity cache.
pub type MapItem<T> = Arc<dyn Fn(&JsonValue) -> Result<T> + Send + Sync>;

/// One page of a cursor-paginated resource
pub struct Page<T> {
    client: HttpClient,
    options: PageOptions,
    map_item: MapItem<T>,
    /// Resource URL with the cursor parameter stripped
    pub url: String,
    /// Raw response body
    pub body: JsonValue,
    /// Mapped items, when the page's data field is an array
    pub contents: Option<Vec<T>>,
    /// Cursor this page was fetched with; empty for the first page
    pub current_cursor: String,
    /// Cursor of the following page
    pub next_cursor: Option<String>,
    /// Cursor of the preceding page
    pub prev_cursor: Option<String>,
    /// Decoded next-cursor metadata, when decoding is enabled
    pub next_cursor_info: Option<CursorInfo>,
    /// Decoded previous-cursor metadata, when decoding is enabled
    pub prev_cursor_info: Option<CursorInfo>,
}

impl<T: Clone> Clone for Page<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            options: self.options.clone(),
            map_item: Arc::clone(&self.map_item),
            url: self.url.clone(),
            body: self.body.clone(),
            contents: self.contents.clone(),
            current_cursor: self.current_cursor.clone(),
            next_cursor: self.next_cursor.clone(),
            prev_cursor: self.prev_cursor.clone(),
            next_cursor_info: self.next_cursor_info.clone(),
            prev_cursor_info: self.prev_cursor_info.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Page<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url)
            .field("current_cursor", &self.current_cursor)
            .field("has_next", &self.has_next())
            .field("has_previous", &self.has_previous())
            .field(
                "items",
                &self.contents.as_ref().map_or(0, Vec::len),
            )
            .finish_non_exhaustive()
    }
}

impl<T> Page<T> {
    /// Fetch the first page of a resource.
    ///
    /// `map_item` transforms each raw item before it lands in
    /// `contents`; a mapping failure fails the page fetch.
    pub async fn first(
        url: &str,
        client: &HttpClient,
        options: PageOptions,
        map_item: impl Fn(&JsonValue) -> Result<T> + Send + Sync + 'static,
    ) -> Result<Page<T>> {
        let response = client.call(url, options.request.clone()).await?;
        let body = response.json.unwrap_or(JsonValue::Null);
        Self::build(
            url,
            client.clone(),
            options,
            Arc::new(map_item),
            body,
            String::new(),
        )
    }

    fn build(
        url: &str,
        client: HttpClient,
        options: PageOptions,
        map_item: MapItem<T>,
        body: JsonValue,
        current_cursor: String,
    ) -> Result<Page<T>> {
        let url = strip_cursor_param(url, &options.cursor_param)?;

        let next_cursor = extract_cursor(&body, &options.next_cursor_field);
        let prev_cursor = extract_cursor(&body, &options.prev_cursor_field);

        let contents = match body.get(&options.data_field) {
            Some(JsonValue::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| (map_item)(item))
                    .collect::<Result<Vec<T>>>()?,
            ),
            _ => None,
        };

        let (next_cursor_info, prev_cursor_info) = if options.decode_cursors {
            (
                next_cursor.as_deref().and_then(decode_cursor),
                prev_cursor.as_deref().and_then(decode_cursor),
            )
        } else {
            (None, None)
        };

        Ok(Page {
            client,
            options,
            map_item,
            url,
            body,
            contents,
            current_cursor,
            next_cursor,
            prev_cursor,
            next_cursor_info,
            prev_cursor_info,
        })
    }

    /// Whether a following page exists
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Whether a preceding page exists
    pub fn has_previous(&self) -> bool {
        self.prev_cursor.is_some()
    }

    /// Fetch the page at an explicit cursor.
    ///
    /// Callers are expected to consult `has_next`/`has_previous` first;
    /// an empty cursor is a contract violation.
    pub async fn from_cursor(&self, cursor: &str) -> Result<Page<T>> {
        if cursor.is_empty() {
            return Err(Error::InvalidCursor);
        }
        let url = with_cursor_param(&self.url, &self.options.cursor_param, cursor)?;
        let response = self.client.call(&url, self.options.request.clone()).await?;
        let body = response.json.unwrap_or(JsonValue::Null);
        Self::build(
            &self.url,
            self.client.clone(),
            self.options.clone(),
            Arc::clone(&self.map_item),
            body,
            cursor.to_string(),
        )
    }

    /// Fetch the following page
    pub async fn next_page(&self) -> Result<Page<T>> {
        match &self.next_cursor {
            Some(cursor) => self.from_cursor(cursor).await,
            None => Err(Error::InvalidCursor),
        }
    }

    /// Fetch the preceding page
    pub async fn prev_page(&self) -> Result<Page<T>> {
        match &self.prev_cursor {
            Some(cursor) => self.from_cursor(cursor).await,
            None => Err(Error::InvalidCursor),
        }
    }
}

impl<T: Clone> Page<T> {
    /// Fetch this page and every remaining page, in order.
    ///
    /// Depending on the API this may take a while due to rate limits.
    pub async fn fetch_all_pages(&self) -> Result<Vec<Page<T>>> {
        let mut pages = Vec::new();
        let mut current = self.clone();
        while current.has_next() {
            let next = current.next_page().await?;
            pages.push(std::mem::replace(&mut current, next));
        }
        pages.push(current);
        Ok(pages)
    }

    /// Fetch every remaining page and flatten the mapped items.
    ///
    /// Fails when this page's content is not an item array.
    pub async fn fetch_all_page_data(&self) -> Result<Vec<T>> {
        if self.contents.is_none() {
            return Err(Error::not_array(&self.url));
        }
        let mut data = Vec::new();
        for page in self.fetch_all_pages().await? {
            if let Some(items) = page.contents {
                data.extend(items);
            }
        }
        Ok(data)
    }

    /// Walk pages forward until the predicate matches, returning the
    /// matching page, or `None` once the sequence is exhausted
    pub async fn search_all_pages(
        &self,
        predicate: impl Fn(&Page<T>) -> bool,
    ) -> Result<Option<Page<T>>> {
        let mut current = self.clone();
        loop {
            if predicate(&current) {
                return Ok(Some(current));
            }
            if !current.has_next() {
                return Ok(None);
            }
            current = current.next_page().await?;
        }
    }

    /// Walk pages forward until the extractor produces a value
    pub async fn find_in_pages<R>(
        &self,
        extract: impl Fn(&Page<T>) -> Option<R>,
    ) -> Result<Option<R>> {
        let mut current = self.clone();
        loop {
            if let Some(found) = extract(&current) {
                return Ok(Some(found));
            }
            if !current.has_next() {
                return Ok(None);
            }
            current = current.next_page().await?;
        }
    }

    /// Linear search across all pages' items
    pub async fn find_item(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        self.find_in_pages(|page| {
            page.contents
                .as_ref()
                .and_then(|items| items.iter().find(|item| predicate(item)).cloned())
        })
        .await
    }

    /// Turn this page into a stream of pages.
    ///
    /// The stream yields this page first and fetches ahead one page as
    /// it is advanced.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page<T>>> {
        futures::stream::try_unfold(Some(self), |state| async move {
            let Some(current) = state else {
                return Ok(None);
            };
            let next = if current.has_next() {
                Some(current.next_page().await?)
            } else {
                None
            };
            Ok(Some((current, next)))
        })
    }
}

/// Pull a cursor out of a page body; empty strings count as absent
fn extract_cursor(body: &JsonValue, field: &str) -> Option<String> {
    body.get(field)
        .and_then(JsonValue::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

/// Normalize a resource URL by dropping its cursor query parameter
fn strip_cursor_param(raw: &str, cursor_param: &str) -> Result<String> {
    let mut url = Url::parse(raw)?;
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != cursor_param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(remaining.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url.to_string())
}

/// Append the cursor query parameter to a normalized resource URL
fn with_cursor_param(raw: &str, cursor_param: &str, cursor: &str) -> Result<String> {
    let mut url = Url::parse(raw)?;
    url.query_pairs_mut().append_pair(cursor_param, cursor);
    Ok(url.to_string())
}
