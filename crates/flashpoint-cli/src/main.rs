//! flashpoint: run one Flashpoint command from the shell.
//!
//! Configuration comes from the environment (see `SessionConfig::from_env`),
//! optionally via a `.env` file. Rows are printed to stdout as JSON; the
//! status line and logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashpoint_client::Integration;
use flashpoint_core::defaults::DEFAULT_INSTANCE;
use flashpoint_core::SessionConfig;

#[derive(Parser)]
#[command(name = "flashpoint")]
#[command(version, about = "Search the Flashpoint media and chat index")]
struct Cli {
    /// Instance name the command runs against
    #[arg(short, long, default_value = DEFAULT_INSTANCE)]
    instance: String,

    /// File holding the query body (cell form); "-" reads stdin
    #[arg(short, long, value_name = "PATH")]
    body: Option<PathBuf>,

    /// Query list file as NAME=PATH, one term per line (repeatable)
    #[arg(long = "list", value_name = "NAME=PATH")]
    lists: Vec<String>,

    /// Pretty-print the JSON rows
    #[arg(long)]
    pretty: bool,

    /// Command text, e.g. search_chat -q alpha -s 2024-01-01
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = SessionConfig::from_env().context("loading session configuration")?;
    let mut integration = Integration::new();
    integration.register_instance(cli.instance.clone(), config)?;

    for entry in &cli.lists {
        let (name, path) = entry
            .split_once('=')
            .with_context(|| format!("list '{}' must be NAME=PATH", entry))?;
        integration.load_list(name, read_list(Path::new(path))?);
    }

    let line = command_line(&cli.command)?;
    let (rows, status) = match &cli.body {
        Some(path) => {
            let body = read_body(path)?;
            integration.run_cell(&line, &body, &cli.instance).await
        }
        None => integration.run(&line, &cli.instance).await,
    };

    eprintln!("{}", status);

    let Some(rows) = rows else {
        return Ok(ExitCode::FAILURE);
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&rows)?
    } else {
        serde_json::to_string(&rows)?
    };
    println!("{}", json);
    info!(row_count = rows.len(), "Printed rows");

    Ok(ExitCode::SUCCESS)
}

/// Rebuild a command line from shell arguments.
///
/// A single argument is taken verbatim so `flashpoint "search_media -q '...'"`
/// keeps its own quoting. Otherwise arguments containing whitespace are
/// re-quoted for the command tokenizer.
fn command_line(args: &[String]) -> anyhow::Result<String> {
    if let [single] = args {
        return Ok(single.clone());
    }

    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        let needs_quotes = arg.is_empty()
            || arg
                .chars()
                .any(|c| c.is_whitespace() || c == '\'' || c == '"');
        if !needs_quotes {
            parts.push(arg.clone());
        } else if !arg.contains('\'') {
            parts.push(format!("'{}'", arg));
        } else if !arg.contains('"') {
            parts.push(format!("\"{}\"", arg));
        } else {
            bail!(
                "argument {:?} mixes single and double quotes; pass the whole command as one argument",
                arg
            );
        }
    }
    Ok(parts.join(" "))
}

fn read_body(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("reading body from stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading body {}", path.display()))
}

fn read_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading query list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

// Environment variables:
//   LOG_FORMAT  - "json" or "text" (default: "text")
//   LOG_FILE    - path to log file (optional, enables file logging)
//   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
//   RUST_LOG    - standard env filter (default: "flashpoint=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "flashpoint=info,flashpoint_client=info,flashpoint_command=info,flashpoint_core=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("flashpoint.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout carries the rows, so console logs go to stderr.
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_argument_is_verbatim() {
        let line = command_line(&args(&["search_media -q 'a b' -s now"])).unwrap();
        assert_eq!(line, "search_media -q 'a b' -s now");
    }

    #[test]
    fn test_split_arguments_are_requoted() {
        let line = command_line(&args(&["search_chat", "-q", "wells fargo", "-s", "now"])).unwrap();
        assert_eq!(line, "search_chat -q 'wells fargo' -s now");

        let line = command_line(&args(&["search_chat", "-q", "it's", "-s", "now"])).unwrap();
        assert_eq!(line, "search_chat -q \"it's\" -s now");
    }

    #[test]
    fn test_mixed_quotes_are_rejected() {
        assert!(command_line(&args(&["search_chat", "-q", r#"a'b"c"#])).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
