//! Turns command text into a validated [`SearchRequest`].

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::debug;

use flashpoint_core::defaults::{DATE_FORMAT, DATE_NOW};
use flashpoint_core::{
    ChatSearch, Command, DateBound, DateRange, ImageLookup, MediaSearch, SearchRequest,
};

use crate::args::{CommandArgs, FlashpointArgs, GetImageArgs, SearchChatArgs, SearchMediaArgs};
use crate::error::ValidationError;
use crate::tokenize::{strip_single_quotes, tokenize};

/// Program name clap sees as `argv[0]`.
const PROGRAM: &str = "%flashpoint";

/// What a command line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A request ready to run.
    Request(SearchRequest),
    /// The user asked for help; holds the rendered text.
    Help(String),
}

/// Validates command text against the loaded named lists.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    named_lists: HashMap<String, Vec<String>>,
    today: NaiveDate,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            named_lists: HashMap::new(),
            today: chrono::Utc::now().date_naive(),
        }
    }

    /// Pin the date `now` is checked against. Defaults to today in UTC.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Make a list of query terms available to `--query-list NAME`.
    pub fn with_named_list(mut self, name: impl Into<String>, terms: Vec<String>) -> Self {
        self.named_lists.insert(name.into(), terms);
        self
    }

    pub fn with_named_lists(mut self, lists: HashMap<String, Vec<String>>) -> Self {
        self.named_lists.extend(lists);
        self
    }

    /// Parse a single-line command.
    pub fn build(&self, line: &str) -> Result<Parsed, ValidationError> {
        let line = single_line(line, "Line command")?;
        self.build_tokens(tokenize(line)?, None)
    }

    /// Parse a command line followed by a body whose one line is the query
    /// (or, for `get_image`, the storage URIs).
    pub fn build_cell(&self, line: &str, body: &str) -> Result<Parsed, ValidationError> {
        let line = single_line(line, "Command line")?;
        let body = body.trim();
        let body = if body.is_empty() {
            None
        } else {
            Some(single_line(body, "Cell query")?.to_string())
        };
        self.build_tokens(tokenize(line)?, body)
    }

    fn build_tokens(
        &self,
        tokens: Vec<String>,
        body: Option<String>,
    ) -> Result<Parsed, ValidationError> {
        if let Some(first) = tokens.first() {
            if !first.starts_with('-') && Command::from_str(first).is_err() {
                return Err(ValidationError::UnknownCommand(first.clone()));
            }
        }

        let argv = std::iter::once(PROGRAM.to_string()).chain(tokens);
        let args = match FlashpointArgs::try_parse_from(argv) {
            Ok(args) => args,
            Err(e) => return clap_error(e),
        };

        let request = match args.command {
            CommandArgs::SearchMedia(media) => self.search_media(media, body)?,
            CommandArgs::SearchChat(chat) => self.search_chat(chat, body)?,
            CommandArgs::GetImage(image) => get_image(image, body)?,
        };

        debug!(command = %request.command(), "Built request");
        Ok(Parsed::Request(request))
    }

    fn search_media(
        &self,
        args: SearchMediaArgs,
        body: Option<String>,
    ) -> Result<SearchRequest, ValidationError> {
        let query = match (args.query, body) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::ConflictingFlags(
                    "--query and a cell query cannot both be given".to_string(),
                ))
            }
            (Some(q), None) => normalize_query(&q)?,
            (None, Some(body)) => normalize_query(strip_single_quotes(&body))?,
            (None, None) => return Err(ValidationError::MissingField("query")),
        };

        Ok(SearchRequest::SearchMedia(MediaSearch {
            query,
            date_range: self.date_range(args.date_start, args.date_end)?,
            limit: positive_limit(args.limit)?,
            images: args.images,
        }))
    }

    fn search_chat(
        &self,
        args: SearchChatArgs,
        body: Option<String>,
    ) -> Result<SearchRequest, ValidationError> {
        let has_inline = !args.queries.is_empty() || body.is_some();
        let queries = match (has_inline, args.query_list) {
            (true, Some(_)) => {
                return Err(ValidationError::ConflictingFlags(
                    "--query-list cannot be combined with query terms".to_string(),
                ))
            }
            (false, Some(name)) => self.resolve_list(&name)?,
            (true, None) => args
                .queries
                .iter()
                .map(String::as_str)
                .chain(body.as_deref().map(strip_single_quotes))
                .map(normalize_query)
                .collect::<Result<Vec<_>, _>>()?,
            (false, None) => return Err(ValidationError::MissingField("query")),
        };

        Ok(SearchRequest::SearchChat(ChatSearch {
            queries,
            date_range: self.date_range(args.date_start, args.date_end)?,
            limit: positive_limit(args.limit)?,
        }))
    }

    fn resolve_list(&self, name: &str) -> Result<Vec<String>, ValidationError> {
        let terms = self
            .named_lists
            .get(name)
            .ok_or_else(|| ValidationError::UnknownList(name.to_string()))?;
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if terms.is_empty() {
            return Err(ValidationError::EmptyList(name.to_string()));
        }
        Ok(terms)
    }

    fn date_range(
        &self,
        start: Option<String>,
        end: Option<String>,
    ) -> Result<DateRange, ValidationError> {
        let start = start.ok_or(ValidationError::MissingField("date_start"))?;
        let start = parse_date_bound(&start)?;
        let end = parse_date_bound(end.as_deref().unwrap_or(DATE_NOW))?;
        DateRange::new(start, end, self.today).map_err(|_| ValidationError::DateOrder {
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

fn get_image(args: GetImageArgs, body: Option<String>) -> Result<SearchRequest, ValidationError> {
    // Flag values arrive unquoted from the tokenizer; body words are raw.
    let body_uris = body
        .iter()
        .flat_map(|b| b.split_whitespace())
        .map(|u| strip_single_quotes(u).to_string());
    let uris: Vec<String> = args
        .uris
        .into_iter()
        .map(|u| u.trim().to_string())
        .chain(body_uris)
        .filter(|u| !u.is_empty())
        .collect();

    if uris.is_empty() {
        return Err(ValidationError::MissingField("uri"));
    }
    Ok(SearchRequest::GetImage(ImageLookup { uris }))
}

/// Accept `YYYY-MM-DD` or `now` (any case). `now` stays symbolic.
pub fn parse_date_bound(value: &str) -> Result<DateBound, ValidationError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(DATE_NOW) {
        return Ok(DateBound::Now);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(DateBound::Date)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

fn normalize_query(raw: &str) -> Result<String, ValidationError> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(query.to_string())
}

fn positive_limit(limit: u32) -> Result<u32, ValidationError> {
    if limit == 0 {
        return Err(ValidationError::InvalidLimit(limit));
    }
    Ok(limit)
}

fn single_line<'a>(text: &'a str, what: &'static str) -> Result<&'a str, ValidationError> {
    let text = text.trim();
    let lines = text.lines().count();
    if lines > 1 {
        return Err(ValidationError::MultiLine { what, lines });
    }
    Ok(text)
}

fn clap_error(e: clap::Error) -> Result<Parsed, ValidationError> {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            Ok(Parsed::Help(e.render().to_string()))
        }
        ErrorKind::ArgumentConflict => Err(ValidationError::ConflictingFlags(first_line(&e))),
        _ => Err(ValidationError::Syntax(first_line(&e))),
    }
}

/// clap's message without the `error: ` prefix and usage footer.
fn first_line(e: &clap::Error) -> String {
    let rendered = e.render().to_string();
    rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn builder() -> RequestBuilder {
        RequestBuilder::new().with_today(date("2024-03-15"))
    }

    fn request(line: &str) -> SearchRequest {
        match builder().build(line).unwrap() {
            Parsed::Request(r) => r,
            Parsed::Help(h) => panic!("unexpected help: {}", h),
        }
    }

    #[test]
    fn test_search_media_defaults() {
        let SearchRequest::SearchMedia(media) = request("search_media -q ransomware -s 2024-03-01")
        else {
            panic!("expected search_media");
        };
        assert_eq!(media.query, "ransomware");
        assert_eq!(media.limit, 25);
        assert!(!media.images);
        assert_eq!(media.date_range.start(), DateBound::Date(date("2024-03-01")));
        assert_eq!(media.date_range.end(), DateBound::Now);
    }

    #[test]
    fn test_search_media_images_and_limit() {
        let SearchRequest::SearchMedia(media) =
            request("search_media -q x -s 2024-01-01 -e 2024-01-31 -l 7 --images")
        else {
            panic!("expected search_media");
        };
        assert!(media.images);
        assert_eq!(media.limit, 7);
        assert_eq!(media.date_range.end(), DateBound::Date(date("2024-01-31")));
    }

    #[test]
    fn test_now_is_case_insensitive() {
        assert_eq!(parse_date_bound("NOW").unwrap(), DateBound::Now);
        assert_eq!(parse_date_bound(" now ").unwrap(), DateBound::Now);
    }

    #[test]
    fn test_explicit_now_end_stays_symbolic() {
        let SearchRequest::SearchChat(chat) = request("search_chat -q x -s 2024-03-01 -e now")
        else {
            panic!("expected search_chat");
        };
        assert_eq!(chat.date_range.end(), DateBound::Now);
    }

    #[test]
    fn test_start_after_today_is_rejected_against_now() {
        let err = builder()
            .build("search_media -q x -s 2024-03-16 -e now")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DateOrder {
                start: "2024-03-16".to_string(),
                end: "now".to_string(),
            }
        );
    }

    #[test]
    fn test_flag_query_keeps_inner_single_quotes() {
        let SearchRequest::SearchMedia(media) = request(r#"search_media -q "'exact'" -s now"#)
        else {
            panic!("expected search_media");
        };
        assert_eq!(media.query, "'exact'");
    }

    #[test]
    fn test_invalid_date() {
        let err = builder()
            .build("search_media -q x -s 2024-13-01")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidDate("2024-13-01".to_string()));
    }

    #[test]
    fn test_inverted_date_range() {
        let err = builder()
            .build("search_chat -q x -s 2024-02-01 -e 2024-01-01")
            .unwrap_err();
        assert!(matches!(err, ValidationError::DateOrder { .. }));
    }

    #[test]
    fn test_missing_date_start() {
        let err = builder().build("search_media -q x").unwrap_err();
        assert_eq!(err, ValidationError::MissingField("date_start"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = builder()
            .build("search_media -q x -s now -l 0")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidLimit(0));
    }

    #[test]
    fn test_empty_query_rejected() {
        let err = builder().build("search_media -q '  ' -s now").unwrap_err();
        assert_eq!(err, ValidationError::EmptyQuery);
    }

    #[test]
    fn test_named_list_resolves() {
        let b = builder().with_named_list(
            "watch",
            vec!["alpha".to_string(), " ".to_string(), "beta".to_string()],
        );
        let Parsed::Request(SearchRequest::SearchChat(chat)) =
            b.build("search_chat -L watch -s now").unwrap()
        else {
            panic!("expected search_chat");
        };
        assert_eq!(chat.queries, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_missing_named_list_is_named_in_error() {
        let err = builder().build("search_chat -L watch -s now").unwrap_err();
        assert_eq!(err, ValidationError::UnknownList("watch".to_string()));
        assert!(err.to_string().contains("watch"));
    }

    #[test]
    fn test_empty_named_list() {
        let err = builder()
            .with_named_list("watch", Vec::new())
            .build("search_chat -L watch -s now")
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyList("watch".to_string()));
    }

    #[test]
    fn test_query_and_list_conflict() {
        let err = builder()
            .with_named_list("watch", vec!["a".to_string()])
            .build("search_chat -q a -L watch -s now")
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingFlags(_)));
    }

    #[test]
    fn test_unknown_command() {
        let err = builder().build("search_web -q x").unwrap_err();
        assert_eq!(err, ValidationError::UnknownCommand("search_web".to_string()));
    }

    #[test]
    fn test_help_short_circuits() {
        for line in ["search_media -h", "search_chat --help", "get_image -u x -h"] {
            match builder().build(line).unwrap() {
                Parsed::Help(text) => assert!(text.contains("Usage"), "{}", text),
                Parsed::Request(r) => panic!("expected help for '{}', got {:?}", line, r),
            }
        }
    }

    #[test]
    fn test_bare_invocation_shows_help() {
        assert!(matches!(builder().build("").unwrap(), Parsed::Help(_)));
    }

    #[test]
    fn test_multi_line_command_rejected() {
        let err = builder()
            .build("search_media -q x\n-s now")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MultiLine {
                what: "Line command",
                lines: 2
            }
        );
    }

    #[test]
    fn test_cell_body_supplies_query() {
        let Parsed::Request(SearchRequest::SearchMedia(media)) = builder()
            .build_cell("search_media -s now", "'+(\"acme bank\") AND leak'\n")
            .unwrap()
        else {
            panic!("expected search_media");
        };
        assert_eq!(media.query, "+(\"acme bank\") AND leak");
    }

    #[test]
    fn test_cell_body_and_flag_conflict() {
        let err = builder()
            .build_cell("search_media -q x -s now", "y")
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingFlags(_)));
    }

    #[test]
    fn test_get_image_from_body() {
        let Parsed::Request(SearchRequest::GetImage(lookup)) =
            builder().build_cell("get_image", "uri-1 uri-2").unwrap()
        else {
            panic!("expected get_image");
        };
        assert_eq!(lookup.uris, vec!["uri-1", "uri-2"]);
    }

    #[test]
    fn test_get_image_requires_uri() {
        let err = builder().build("get_image").unwrap_err();
        assert_eq!(err, ValidationError::MissingField("uri"));
    }
}
