//! # flashpoint-core
//!
//! Core types, configuration, and response flattening for the Flashpoint
//! search client.
//!
//! This crate provides:
//! - The request and fetch data model (`SearchRequest`, `FetchItem`, `FetchResult`)
//! - Explicit correlation keys for matching async results to their origin
//! - Path-based flattening of search hits into table rows
//! - Resolved per-instance session configuration
//! - Shared defaults and structured logging field names

pub mod config;
pub mod defaults;
pub mod error;
pub mod flatten;
pub mod image;
pub mod logging;
pub mod models;

// Re-export commonly used types at crate root
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use flatten::{extract_hits, JsonPath, ResponseFlattener, IMAGE_CONTENT_FIELD};
pub use image::{encode_image, image_html, image_row};
pub use models::*;
