//! Validation errors raised before any request leaves the process.

use thiserror::Error;

/// A rejected command. Carries a message fit to show the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Tokenizing or flag parsing failed.
    #[error("Invalid input: {0}")]
    Syntax(String),

    /// First token is not a known command.
    #[error("Unknown command '{0}', expected one of: search_media, search_chat, get_image")]
    UnknownCommand(String),

    /// A required field was not supplied.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Date is neither `YYYY-MM-DD` nor `now`.
    #[error("Not a valid date: {0}")]
    InvalidDate(String),

    /// `date_start` falls after `date_end`.
    #[error("date_start {start} is after date_end {end}")]
    DateOrder { start: String, end: String },

    #[error("limit must be a positive integer, got {0}")]
    InvalidLimit(u32),

    #[error("Query must not be empty")]
    EmptyQuery,

    /// Named query list was never loaded.
    #[error("Named list '{0}' is not loaded")]
    UnknownList(String),

    #[error("Named list '{0}' is empty")]
    EmptyList(String),

    /// Two mutually exclusive inputs were both given.
    #[error("Conflicting arguments: {0}")]
    ConflictingFlags(String),

    #[error("{what} must be a single line, got {lines} lines")]
    MultiLine { what: &'static str, lines: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_list_names_the_list() {
        let err = ValidationError::UnknownList("watchlist".to_string());
        assert_eq!(err.to_string(), "Named list 'watchlist' is not loaded");
    }

    #[test]
    fn test_date_order_message() {
        let err = ValidationError::DateOrder {
            start: "2024-02-01".to_string(),
            end: "2024-01-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "date_start 2024-02-01 is after date_end 2024-01-01"
        );
    }

    #[test]
    fn test_multi_line_message() {
        let err = ValidationError::MultiLine {
            what: "Line command",
            lines: 3,
        };
        assert_eq!(err.to_string(), "Line command must be a single line, got 3 lines");
    }
}
