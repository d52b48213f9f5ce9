//! Path-based flattening of nested search hits into flat rows.
//!
//! Each command has a fixed list of path expressions. Flattening a hit
//! evaluates every path against it and stores the result under the path
//! string itself:
//!
//! - no match yields an empty string,
//! - several matches are joined with `", "`.
//!
//! The join is lossy (list-valued fields collapse to one string) and that is
//! the output contract downstream tables rely on.
//!
//! Supported syntax is the subset the path lists use: dotted field names,
//! quoted bracket fields (`body.['text/plain']`), integer indexes
//! (`media_v2[0]`) and the `[*]` wildcard.

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::defaults::JOIN_SEPARATOR;
use crate::error::{Error, Result};
use crate::models::{Command, FlattenedRow};

/// Column holding the base64 image merged into a media hit.
pub const IMAGE_CONTENT_FIELD: &str = "image_content";

/// Paths extracted from `search_media` hits.
pub const MEDIA_PATHS: &[&str] = &[
    IMAGE_CONTENT_FIELD,
    "_source.sort_date",
    "_source.title",
    "_source.media.fpid",
    "_source.body.['text/plain']",
    "_source.enrichments.v1.social_media[*].handle",
    "_source.enrichments.v1.social_media[*].site",
    "_source.enrichments.v1.urls[*].domain",
    "_source.media.md5",
    "_source.media.sha1",
    "_source.media.phash",
    "_source.container.fpid",
    "_source.media.storage_uri",
    "_source.site_actor.names.aliases[*]",
    "_source.site_actor.native_id",
    "_source.media_v2[0].image_enrichment.enrichments.v1.image-analysis.text[0].value",
];

/// Paths extracted from `search_chat` hits.
pub const CHAT_PATHS: &[&str] = &[
    "_source.sort_date",
    "_source.site.title",
    "_source.container.name",
    "_source.container.title",
    "_source.container.native_id",
    "_source.site_actor.names.handle",
    "_source.site_actor.names.aliases[*]",
    "_source.site_actor.native_id",
    "_source.body.['text/plain']",
    "_source.enrichments.v1.urls[*].domain",
    "_source.enrichments.v1.social_media[*].handle",
    "_source.enrichments.v1.social_media[*].site",
    "_source.fpid",
    "_source.media.storage_uri",
];

static MEDIA_FLATTENER: Lazy<ResponseFlattener> =
    Lazy::new(|| ResponseFlattener::new(MEDIA_PATHS).expect("media path list is valid"));

static CHAT_FLATTENER: Lazy<ResponseFlattener> =
    Lazy::new(|| ResponseFlattener::new(CHAT_PATHS).expect("chat path list is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let chars: Vec<char> = raw.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        // A segment must follow the start of the path and every dot.
        let mut need_segment = true;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if need_segment {
                        return Err(invalid("empty segment"));
                    }
                    need_segment = true;
                    i += 1;
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| invalid("unterminated bracket"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim()).ok_or_else(|| {
                        invalid("bracket must hold *, an index, or a quoted name")
                    })?);
                    need_segment = false;
                    i = close + 1;
                }
                _ => {
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    segments.push(if name == "*" {
                        Segment::Wildcard
                    } else {
                        Segment::Field(name)
                    });
                    need_segment = false;
                }
            }
        }

        if need_segment {
            return Err(invalid("path must not be empty or end with '.'"));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All nodes matched by this path, in document order.
    pub fn find<'a>(&self, root: &'a JsonValue) -> Vec<&'a JsonValue> {
        let mut nodes = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in nodes {
                match (segment, node) {
                    (Segment::Field(name), JsonValue::Object(map)) => {
                        if let Some(v) = map.get(name) {
                            next.push(v);
                        }
                    }
                    (Segment::Index(idx), JsonValue::Array(items)) => {
                        if let Some(v) = items.get(*idx) {
                            next.push(v);
                        }
                    }
                    (Segment::Wildcard, JsonValue::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, JsonValue::Object(map)) => next.extend(map.values()),
                    _ => {}
                }
            }
            if next.is_empty() {
                return next;
            }
            nodes = next;
        }
        nodes
    }

    /// Matches rendered as text and joined with `", "`. Nulls are skipped.
    pub fn extract(&self, root: &JsonValue) -> String {
        self.find(root)
            .into_iter()
            .filter_map(render_scalar)
            .collect::<Vec<_>>()
            .join(JOIN_SEPARATOR)
    }
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    if let Ok(idx) = inner.parse::<usize>() {
        return Some(Segment::Index(idx));
    }
    let quoted = (inner.starts_with('\'') && inner.ends_with('\''))
        || (inner.starts_with('"') && inner.ends_with('"'));
    if quoted && inner.len() >= 2 {
        return Some(Segment::Field(inner[1..inner.len() - 1].to_string()));
    }
    None
}

fn render_scalar(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(_) | JsonValue::Number(_) => Some(value.to_string()),
        JsonValue::Array(_) | JsonValue::Object(_) => Some(value.to_string()),
    }
}

/// Flattens hits with a fixed path list.
#[derive(Debug, Clone)]
pub struct ResponseFlattener {
    paths: Vec<JsonPath>,
}

impl ResponseFlattener {
    pub fn new(paths: &[&str]) -> Result<Self> {
        let paths = paths
            .iter()
            .map(|p| JsonPath::parse(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { paths })
    }

    /// The fixed flattener for a search command. `get_image` has no hit
    /// paths; its rows are built from raw bytes in [`crate::image`].
    pub fn for_command(command: Command) -> Option<&'static ResponseFlattener> {
        match command {
            Command::SearchMedia => Some(&*MEDIA_FLATTENER),
            Command::SearchChat => Some(&*CHAT_FLATTENER),
            Command::GetImage => None,
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(|p| p.as_str())
    }

    /// Flatten one hit into a row keyed by path expression.
    pub fn flatten_hit(&self, hit: &JsonValue) -> FlattenedRow {
        let mut row = FlattenedRow::new();
        for path in &self.paths {
            let value = path.extract(hit);
            trace!(path = path.as_str(), len = value.len(), "Extracted path");
            row.insert(path.as_str(), value);
        }
        row
    }

    pub fn flatten_hits(&self, hits: &[JsonValue]) -> Vec<FlattenedRow> {
        hits.iter().map(|hit| self.flatten_hit(hit)).collect()
    }
}

/// The `hits.hits` array of a search response.
pub fn extract_hits(response: &JsonValue) -> Result<&Vec<JsonValue>> {
    response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| Error::MalformedResponse("missing hits.hits array".to_string()))
}
