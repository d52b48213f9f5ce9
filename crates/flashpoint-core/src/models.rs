//! Data model shared by the parser, the fetch layer and the flattener.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

use crate::defaults::{DATE_FORMAT, DATE_NOW};
use crate::error::{Error, Result};

// =============================================================================
// COMMANDS
// =============================================================================

/// The closed set of commands the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SearchMedia,
    SearchChat,
    GetImage,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::SearchMedia, Command::SearchChat, Command::GetImage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::SearchMedia => "search_media",
            Command::SearchChat => "search_chat",
            Command::GetImage => "get_image",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Command::ALL.iter().map(|c| c.as_str()).collect();
                Error::InvalidInput(format!(
                    "unknown command '{}', expected one of: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// One end of a [`DateRange`].
///
/// `Now` is sent upstream as the literal `now`, which the server evaluates
/// in UTC. It only becomes a calendar date for local validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Date(NaiveDate),
    Now,
}

impl DateBound {
    /// The calendar date this bound denotes when today is `today`.
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            DateBound::Date(date) => date,
            DateBound::Now => today,
        }
    }
}

impl From<NaiveDate> for DateBound {
    fn from(date: NaiveDate) -> Self {
        DateBound::Date(date)
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            DateBound::Now => f.write_str(DATE_NOW),
        }
    }
}

/// Inclusive date range. The start never falls after the end once `now`
/// is resolved against the day the range was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateBound,
    end: DateBound,
}

impl DateRange {
    pub fn new(
        start: impl Into<DateBound>,
        end: impl Into<DateBound>,
        today: NaiveDate,
    ) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start.resolve(today) > end.resolve(today) {
            return Err(Error::InvalidInput(format!(
                "date_start {} is after date_end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateBound {
        self.start
    }

    pub fn end(&self) -> DateBound {
        self.end
    }
}

/// Parameters of a `search_media` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSearch {
    pub query: String,
    pub date_range: DateRange,
    pub limit: u32,
    /// Fetch the image behind every hit and attach it to the row.
    pub images: bool,
}

/// Parameters of a `search_chat` request. One upstream search per query term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSearch {
    pub queries: Vec<String>,
    pub date_range: DateRange,
    pub limit: u32,
}

/// Parameters of a `get_image` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLookup {
    /// `_source.media.storage_uri` values, one fetch each.
    pub uris: Vec<String>,
}

/// A validated request, ready for orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    SearchMedia(MediaSearch),
    SearchChat(ChatSearch),
    GetImage(ImageLookup),
}

impl SearchRequest {
    pub fn command(&self) -> Command {
        match self {
            SearchRequest::SearchMedia(_) => Command::SearchMedia,
            SearchRequest::SearchChat(_) => Command::SearchChat,
            SearchRequest::GetImage(_) => Command::GetImage,
        }
    }
}

// =============================================================================
// FETCH ITEMS
// =============================================================================

/// Ties an asynchronous result back to the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// The query term a search was issued for.
    Query(String),
    /// Position in the originating list (primary hits, requested URIs).
    Index(usize),
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Query(q) => f.write_str(q),
            CorrelationKey::Index(i) => write!(f, "#{}", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// One HTTP request to perform. Immutable once built.
///
/// For `POST` the payload is sent as the JSON body; for `GET` the payload's
/// top-level members become query parameters.
#[derive(Debug, Clone)]
pub struct FetchItem {
    method: HttpMethod,
    url: String,
    key: CorrelationKey,
    payload: JsonValue,
    headers: Vec<(String, String)>,
}

impl FetchItem {
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        key: CorrelationKey,
        payload: JsonValue,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            key,
            payload,
            headers,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Payload members rendered as query parameters (used for `GET`).
    pub fn query_params(&self) -> Vec<(String, String)> {
        match &self.payload {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Outcome of one fetch that reached a usable terminal status
/// (200, or 429 after retries were exhausted).
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub key: CorrelationKey,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Matched records for JSON bodies, 1 for binary bodies, 0 when rate-limited.
    pub hit_count: usize,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<JsonValue> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// One flat output row. Columns keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedRow {
    columns: Vec<(String, String)>,
}

impl FlattenedRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing the value in place if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for FlattenedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, v) in &self.columns {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
