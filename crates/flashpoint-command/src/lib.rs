//! # flashpoint-command
//!
//! Parses the terse command text typed into a notebook cell and validates it
//! into a typed [`flashpoint_core::SearchRequest`].
//!
//! ```
//! use flashpoint_command::{Parsed, RequestBuilder};
//!
//! let builder = RequestBuilder::new();
//! let parsed = builder
//!     .build("search_chat -q alpha -q beta -s 2024-01-01 -e 2024-01-31")
//!     .unwrap();
//! assert!(matches!(parsed, Parsed::Request(_)));
//! ```

pub mod args;
pub mod builder;
pub mod error;
pub mod tokenize;

pub use builder::{parse_date_bound, Parsed, RequestBuilder};
pub use error::ValidationError;
pub use tokenize::{strip_single_quotes, tokenize};
