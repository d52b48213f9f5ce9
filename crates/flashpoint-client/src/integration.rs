//! Collaborator-facing entry point.
//!
//! The notebook host resolves credentials, proxies and TLS policy, registers
//! the result per instance name, and then calls [`Integration::run`] with
//! raw command text. Every outcome, including validation errors and help
//! requests, comes back as `(rows, status)`; nothing here panics or raises
//! into the host.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::field::{display, Empty};
use tracing::{error, info, info_span, Instrument, Span};
use uuid::Uuid;

use flashpoint_command::{Parsed, RequestBuilder};
use flashpoint_core::defaults::DEFAULT_INSTANCE;
use flashpoint_core::{logging, FlattenedRow, Result, SessionConfig};

use crate::orchestrator::SearchOrchestrator;
use crate::progress::ProgressEvent;

/// Rows (when the command produced a table) and a status line.
pub type RunOutput = (Option<Vec<FlattenedRow>>, String);

#[derive(Default)]
pub struct Integration {
    instances: HashMap<String, SearchOrchestrator>,
    named_lists: HashMap<String, Vec<String>>,
}

impl Integration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolved session under `name`, replacing any previous one.
    pub fn register_instance(&mut self, name: impl Into<String>, config: SessionConfig) -> Result<()> {
        let orchestrator = SearchOrchestrator::new(config)?;
        self.register_orchestrator(name, orchestrator);
        Ok(())
    }

    /// Register a prebuilt orchestrator, e.g. one with a custom transport.
    pub fn register_orchestrator(&mut self, name: impl Into<String>, orchestrator: SearchOrchestrator) {
        let name = name.into();
        info!(instance = %name, base_url = %orchestrator.config().base_url, "Registered instance");
        self.instances.insert(name, orchestrator);
    }

    /// Make a list of query terms available to `search_chat -L <name>`.
    pub fn load_list(&mut self, name: impl Into<String>, terms: Vec<String>) {
        let name = name.into();
        info!(list = %name, terms = terms.len(), "Loaded query list");
        self.named_lists.insert(name, terms);
    }

    /// Progress events for commands run against `instance`.
    pub fn subscribe(&self, instance: &str) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.instances.get(instance).map(SearchOrchestrator::subscribe)
    }

    pub fn instances(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Run one command line against `instance` (empty means the default).
    pub async fn run(&self, command_text: &str, instance: &str) -> RunOutput {
        self.run_with_body(command_text, None, instance).await
    }

    /// Run the cell form: a command line plus a body holding the query.
    pub async fn run_cell(&self, line: &str, body: &str, instance: &str) -> RunOutput {
        self.run_with_body(line, Some(body), instance).await
    }

    async fn run_with_body(&self, line: &str, body: Option<&str>, instance: &str) -> RunOutput {
        let instance = if instance.trim().is_empty() {
            DEFAULT_INSTANCE
        } else {
            instance.trim()
        };
        self.execute(line, body, instance)
            .instrument(run_span(instance))
            .await
    }

    async fn execute(&self, line: &str, body: Option<&str>, instance: &str) -> RunOutput {
        let start = Instant::now();
        let builder = RequestBuilder::new().with_named_lists(self.named_lists.clone());
        let parsed = match body {
            Some(body) => builder.build_cell(line, body),
            None => builder.build(line),
        };

        let request = match parsed {
            Ok(Parsed::Request(request)) => request,
            Ok(Parsed::Help(text)) => return (None, text),
            Err(e) => {
                info!(error = %e, "Rejected command");
                return (None, e.to_string());
            }
        };

        let Some(orchestrator) = self.instances.get(instance) else {
            error!("Instance is not registered");
            return (None, format!("Instance '{}' is not registered", instance));
        };

        let command = request.command();
        Span::current().record(logging::COMMAND, command.as_str());
        info!("Running command");

        match orchestrator.execute(&request).await {
            Ok(outcome) => {
                let status = outcome.status();
                info!(
                    command = %command,
                    row_count = outcome.rows.len(),
                    failure_count = outcome.failures.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Command finished"
                );
                (Some(outcome.rows), status)
            }
            Err(e) => {
                error!(
                    command = %command,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Command failed"
                );
                (None, format!("{} failed: {}", command, e))
            }
        }
    }
}

/// Span covering one invocation. `command` is filled in once parsing succeeds.
fn run_span(instance: &str) -> Span {
    let span = info_span!(
        "flashpoint_run",
        request_id = Empty,
        instance = Empty,
        command = Empty
    );
    span.record(logging::REQUEST_ID, display(Uuid::now_v7()));
    span.record(logging::INSTANCE, instance);
    span
}
