//! Flag definitions for the command text surface.
//!
//! Fields that carry domain rules (dates, queries, list references) are kept
//! as raw strings here and validated by the request builder, so every
//! rejection is reported as a structured [`crate::ValidationError`].

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "%flashpoint")]
#[command(about = "Search the Flashpoint media and chat index")]
#[command(disable_version_flag = true, arg_required_else_help = true)]
pub struct FlashpointArgs {
    #[command(subcommand)]
    pub command: CommandArgs,
}

#[derive(Subcommand, Debug)]
pub enum CommandArgs {
    /// Search Flashpoint for images and videos that match your query
    #[command(name = "search_media")]
    SearchMedia(SearchMediaArgs),

    /// Search Flashpoint chat messages for one or more query terms
    #[command(name = "search_chat")]
    SearchChat(SearchChatArgs),

    /// Get images by their _source.media.storage_uri value
    #[command(name = "get_image")]
    GetImage(GetImageArgs),
}

#[derive(Args, Debug)]
pub struct SearchMediaArgs {
    /// Query in Flashpoint syntax; wrap it in single quotes to keep special characters
    #[arg(short, long, allow_hyphen_values = true)]
    pub query: Option<String>,

    /// Earliest date to search (YYYY-MM-DD or "now")
    #[arg(short = 's', long = "date-start", value_name = "DATE")]
    pub date_start: Option<String>,

    /// Latest date to search (YYYY-MM-DD or "now")
    #[arg(short = 'e', long = "date-end", value_name = "DATE")]
    pub date_end: Option<String>,

    /// Maximum number of results
    #[arg(short, long, default_value_t = flashpoint_core::defaults::SEARCH_LIMIT)]
    pub limit: u32,

    /// Include image thumbnails in results
    #[arg(long, action = ArgAction::SetTrue, overrides_with = "no_images")]
    pub images: bool,

    /// Do not fetch images (default)
    #[arg(long = "no-images", action = ArgAction::SetTrue, overrides_with = "images")]
    pub no_images: bool,
}

#[derive(Args, Debug)]
pub struct SearchChatArgs {
    /// Query term; repeat the flag to search several terms concurrently
    #[arg(
        short,
        long = "query",
        action = ArgAction::Append,
        allow_hyphen_values = true,
        conflicts_with = "query_list"
    )]
    pub queries: Vec<String>,

    /// Name of a loaded list of query terms
    #[arg(short = 'L', long = "query-list", value_name = "NAME")]
    pub query_list: Option<String>,

    /// Earliest date to search (YYYY-MM-DD or "now")
    #[arg(short = 's', long = "date-start", value_name = "DATE")]
    pub date_start: Option<String>,

    /// Latest date to search (YYYY-MM-DD or "now")
    #[arg(short = 'e', long = "date-end", value_name = "DATE")]
    pub date_end: Option<String>,

    /// Maximum number of results per query term
    #[arg(short, long, default_value_t = flashpoint_core::defaults::SEARCH_LIMIT)]
    pub limit: u32,
}

#[derive(Args, Debug)]
pub struct GetImageArgs {
    /// Storage URI of an image; repeat the flag or list several values
    #[arg(short = 'u', long = "uri", num_args = 1.., action = ArgAction::Append)]
    pub uris: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        FlashpointArgs::command().debug_assert();
    }

    #[test]
    fn test_images_flag_last_one_wins() {
        let args = FlashpointArgs::try_parse_from([
            "%flashpoint",
            "search_media",
            "--images",
            "--no-images",
        ])
        .unwrap();
        match args.command {
            CommandArgs::SearchMedia(m) => assert!(!m.images),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_query_and_query_list_conflict() {
        let err = FlashpointArgs::try_parse_from([
            "%flashpoint",
            "search_chat",
            "-q",
            "a",
            "-L",
            "terms",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_query_values_may_start_with_hyphen() {
        let args = FlashpointArgs::try_parse_from([
            "%flashpoint",
            "search_chat",
            "-q",
            "-spam +bank",
            "--query",
            "-leak",
            "-s",
            "now",
        ])
        .unwrap();
        match args.command {
            CommandArgs::SearchChat(c) => {
                assert_eq!(c.queries, vec!["-spam +bank", "-leak"]);
                assert_eq!(c.date_start.as_deref(), Some("now"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
