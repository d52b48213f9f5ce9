//! Centralized default constants for the Flashpoint client.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// UPSTREAM ENDPOINTS
// =============================================================================

/// Path of the search endpoint, relative to the session base URL.
pub const SEARCH_PATH: &str = "/all/search";

/// Media asset endpoint. Lives on the UI API rather than the search API host.
pub const MEDIA_ASSETS_URL: &str = "https://fp.tools/ui/v4/media/assets";

/// Query parameter naming the asset on the media endpoint.
pub const ASSET_ID_PARAM: &str = "asset_id";

/// Content type sent with image requests.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Content type sent with search requests.
pub const JSON_CONTENT_TYPE: &str = "application/json";

// =============================================================================
// REQUEST DEFAULTS
// =============================================================================

/// Default number of hits requested per search.
pub const SEARCH_LIMIT: u32 = 25;

/// Literal accepted in place of a date. Sent upstream as-is; the server reads it as today in UTC.
pub const DATE_NOW: &str = "now";

/// Date format accepted on the command line and sent upstream.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// RETRY / CONCURRENCY
// =============================================================================

/// Maximum retries of a rate-limited (HTTP 429) request.
pub const MAX_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds. Retry `n` waits `base * 3^n`.
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Growth factor applied per retry.
pub const BACKOFF_MULTIPLIER: u32 = 3;

/// Default worker pool size for concurrent fetches.
pub const MAX_WORKERS: usize = 10;

/// Delay between consecutive completions collected by the dispatcher.
pub const THROTTLE_MS: u64 = 100;

/// Per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Progress event channel capacity.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// INTEGRATION
// =============================================================================

/// Instance name used when the caller does not name one.
pub const DEFAULT_INSTANCE: &str = "default";

/// Separator used when a path matches more than one node.
pub const JOIN_SEPARATOR: &str = ", ";
