//! Splits a command line into tokens.
//!
//! Whitespace separates tokens. A single-quoted span is taken verbatim with
//! the quotes removed, so boolean query syntax such as
//! `'|"wells fargo" |checking'` survives as one token with its double quotes
//! intact. Double-quoted spans work the same way. Quoted and bare text that
//! touch join into one token. There are no escape sequences.

use crate::error::ValidationError;

pub fn tokenize(line: &str) -> Result<Vec<String>, ValidationError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty token) from no token at all.
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                in_token = true;
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == c {
                        closed = true;
                        break;
                    }
                    current.push(inner);
                }
                if !closed {
                    return Err(ValidationError::Syntax(format!(
                        "unterminated {} quote",
                        if c == '\'' { "single" } else { "double" }
                    )));
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Remove one pair of wrapping single quotes, if present.
pub fn strip_single_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
