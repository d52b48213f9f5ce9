//! Structured logging schema and field name constants.
//!
//! Field names of the per-invocation span. Events inside the span inherit
//! them, so one `request_id` ties together the parser, the fetch workers
//! and the orchestrator.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | An invocation failed and produced no rows |
//! | WARN  | Rate-limit retry, failed item in a batch, missing image key |
//! | INFO  | Invocation and batch completions |
//! | DEBUG | Decision points, built requests, dispatch sizing |
//! | TRACE | Per-hit and per-path work |

// ─── Span fields ───────────────────────────────────────────────────────────

/// Correlation ID for one `Integration::run` invocation.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Target instance name.
pub const INSTANCE: &str = "instance";

/// Command being executed. Recorded once the command text parses.
/// Values: "search_media", "search_chat", "get_image"
pub const COMMAND: &str = "command";
