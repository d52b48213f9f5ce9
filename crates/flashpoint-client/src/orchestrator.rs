//! Per-command search orchestration.
//!
//! Turns a validated [`SearchRequest`] into fetch items, runs them, and
//! shapes the results into rows. Asynchronous results are always matched
//! back to their origin through the [`CorrelationKey`], never by arrival
//! order.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use flashpoint_core::defaults::PROGRESS_CHANNEL_CAPACITY;
use flashpoint_core::{
    encode_image, extract_hits, image_row, ChatSearch, Command, CorrelationKey, Error, FetchResult,
    FlattenedRow, ImageLookup, MediaSearch, ResponseFlattener, Result, SearchRequest,
    SessionConfig, IMAGE_CONTENT_FIELD,
};

use crate::dispatcher::ConcurrentDispatcher;
use crate::payload;
use crate::progress::{Progress, ProgressEvent};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::worker::{FetchError, FetchOutcome, HttpFetchWorker, RetryPolicy};

/// Column naming the query term a chat row came from.
pub const QUERY_COLUMN: &str = "query";

/// A secondary fetch that did not produce data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Query term, storage URI, or hit position the fetch belonged to.
    pub origin: String,
    /// Upstream status, when one was received.
    pub status: Option<u16>,
    pub reason: String,
}

impl FetchFailure {
    fn from_error(origin: String, error: &FetchError) -> Self {
        Self {
            origin,
            status: error.status(),
            reason: error.to_string(),
        }
    }

    fn rate_limited(origin: String, result: &FetchResult) -> Self {
        Self {
            origin,
            status: Some(result.status),
            reason: "rate limited, retries exhausted".to_string(),
        }
    }
}

/// Rows plus everything that went wrong along the way.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub command: Command,
    pub rows: Vec<FlattenedRow>,
    pub failures: Vec<FetchFailure>,
    pub total_hits: usize,
}

impl SearchOutcome {
    /// One-line summary for the caller.
    pub fn status(&self) -> String {
        let mut status = format!(
            "{}: {} row{} (total hits {})",
            self.command,
            self.rows.len(),
            if self.rows.len() == 1 { "" } else { "s" },
            self.total_hits
        );
        if !self.failures.is_empty() {
            let failed: Vec<String> = self
                .failures
                .iter()
                .map(|f| match f.status {
                    Some(code) => format!("{} (HTTP {})", f.origin, code),
                    None => format!("{} ({})", f.origin, f.reason),
                })
                .collect();
            status.push_str(&format!(
                "; {} failed: {}",
                self.failures.len(),
                failed.join(", ")
            ));
        }
        status
    }
}

pub struct SearchOrchestrator {
    config: SessionConfig,
    worker: HttpFetchWorker,
    dispatcher: ConcurrentDispatcher,
    events: broadcast::Sender<ProgressEvent>,
}

impl SearchOrchestrator {
    /// Orchestrator backed by a reqwest client built from `config`.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: SessionConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let worker = HttpFetchWorker::new(transport, RetryPolicy::from_config(&config));
        let dispatcher =
            ConcurrentDispatcher::new(worker.clone(), config.max_workers, config.throttle);
        let (events, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            config,
            worker,
            dispatcher,
            events,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Progress events for every batch this orchestrator runs.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    fn progress(&self, total: usize) -> Arc<Progress> {
        Arc::new(Progress::with_sender(total, self.events.clone()))
    }

    pub async fn execute(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        match request {
            SearchRequest::SearchMedia(media) => self.search_media(media).await,
            SearchRequest::SearchChat(chat) => self.search_chat(chat).await,
            SearchRequest::GetImage(lookup) => self.get_image(lookup).await,
        }
    }

    /// One primary search, then optionally one image fetch per hit.
    ///
    /// A failed or rate-limited primary search fails the whole command.
    /// Image fetch failures only leave that hit's `image_content` empty.
    pub async fn search_media(&self, request: &MediaSearch) -> Result<SearchOutcome> {
        let query = payload::media_query(&request.query, &request.date_range);
        let item = payload::search_item(
            &self.config,
            CorrelationKey::Query(request.query.clone()),
            &query,
            request.limit,
        );

        let progress = self.progress(1);
        let primary = self.worker.fetch(item, Some(progress.as_ref())).await?;
        if !primary.is_success() {
            return Err(Error::RateLimited(format!(
                "search for '{}' was rate limited after {} retries",
                request.query,
                self.worker.policy().max_retries
            )));
        }

        let mut response = primary.json()?;
        let total_hits = primary.hit_count;
        let hits = response
            .pointer_mut("/hits/hits")
            .and_then(JsonValue::as_array_mut)
            .ok_or_else(|| Error::MalformedResponse("response has no hits.hits array".into()))?;

        let mut failures = Vec::new();
        if request.images {
            failures = self.attach_images(hits).await;
        }

        let rows = flattener(Command::SearchMedia)?.flatten_hits(hits);
        info!(
            command = %Command::SearchMedia,
            row_count = rows.len(),
            failure_count = failures.len(),
            total_hits,
            "Media search finished"
        );

        Ok(SearchOutcome {
            command: Command::SearchMedia,
            rows,
            failures,
            total_hits,
        })
    }

    /// Fetch the image behind every hit and store it base64-encoded under
    /// `image_content` on the hit it belongs to.
    async fn attach_images(&self, hits: &mut [JsonValue]) -> Vec<FetchFailure> {
        let mut failures = Vec::new();
        let mut items = Vec::with_capacity(hits.len());

        for (idx, hit) in hits.iter().enumerate() {
            match hit
                .pointer("/_source/media/storage_uri")
                .and_then(JsonValue::as_str)
            {
                Some(uri) => items.push(payload::image_item(
                    &self.config,
                    uri,
                    CorrelationKey::Index(idx),
                )),
                None => {
                    warn!(correlation_key = %CorrelationKey::Index(idx), "Hit has no storage URI");
                    failures.push(FetchFailure {
                        origin: hit_origin(idx),
                        status: None,
                        reason: "missing _source.media.storage_uri".to_string(),
                    });
                }
            }
        }

        if items.is_empty() {
            return failures;
        }

        let progress = self.progress(items.len());
        for outcome in self.dispatcher.dispatch_with_progress(items, progress).await {
            match outcome {
                Ok(result) => {
                    let idx = match &result.key {
                        CorrelationKey::Index(idx) => *idx,
                        CorrelationKey::Query(_) => continue,
                    };
                    if !result.is_success() {
                        failures.push(FetchFailure::rate_limited(hit_origin(idx), &result));
                        continue;
                    }
                    if let Some(hit) = hits.get_mut(idx).and_then(JsonValue::as_object_mut) {
                        hit.insert(
                            IMAGE_CONTENT_FIELD.to_string(),
                            JsonValue::String(encode_image(&result.body)),
                        );
                    }
                }
                Err(e) => {
                    let origin = match e.key() {
                        CorrelationKey::Index(idx) => hit_origin(*idx),
                        key => key.to_string(),
                    };
                    failures.push(FetchFailure::from_error(origin, &e));
                }
            }
        }

        failures
    }

    /// One search per query term. Failed terms are reported, the rest still
    /// produce rows, in input term order.
    pub async fn search_chat(&self, request: &ChatSearch) -> Result<SearchOutcome> {
        let items = request
            .queries
            .iter()
            .map(|term| {
                payload::search_item(
                    &self.config,
                    CorrelationKey::Query(term.clone()),
                    &payload::chat_query(term, &request.date_range),
                    request.limit,
                )
            })
            .collect();

        let progress = self.progress(request.queries.len());
        let outcomes = self
            .dispatcher
            .dispatch_with_progress(items, progress.clone())
            .await;

        let (mut successes, failed) = partition(outcomes, |key| key.to_string());
        successes.sort_by_key(|result| term_position(&request.queries, &result.key));

        let flattener = flattener(Command::SearchChat)?;
        let mut failures = failed;
        let mut rows = Vec::new();

        for result in successes {
            let term = result.key.to_string();
            let body = match result.json() {
                Ok(body) => body,
                Err(e) => {
                    failures.push(FetchFailure {
                        origin: term,
                        status: Some(result.status),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let hits = match extract_hits(&body) {
                Ok(hits) => hits,
                Err(e) => {
                    failures.push(FetchFailure {
                        origin: term,
                        status: Some(result.status),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(correlation_key = %result.key, hit_count = hits.len(), "Flattening chat hits");
            for hit in hits {
                let mut row = FlattenedRow::new();
                row.insert(QUERY_COLUMN, term.as_str());
                for (column, value) in flattener.flatten_hit(hit).iter() {
                    row.insert(column, value);
                }
                rows.push(row);
            }
        }

        info!(
            command = %Command::SearchChat,
            row_count = rows.len(),
            failure_count = failures.len(),
            total_hits = progress.total_hits(),
            "Chat search finished"
        );

        Ok(SearchOutcome {
            command: Command::SearchChat,
            rows,
            failures,
            total_hits: progress.total_hits(),
        })
    }

    /// One image fetch per storage URI; one `{image_b64, image_html}` row per
    /// successful URI, in request order.
    pub async fn get_image(&self, request: &ImageLookup) -> Result<SearchOutcome> {
        let items = request
            .uris
            .iter()
            .enumerate()
            .map(|(idx, uri)| payload::image_item(&self.config, uri, CorrelationKey::Index(idx)))
            .collect();

        let progress = self.progress(request.uris.len());
        let outcomes = self
            .dispatcher
            .dispatch_with_progress(items, progress.clone())
            .await;

        let (mut successes, failures) = partition(outcomes, |key| match key {
            CorrelationKey::Index(i) => request
                .uris
                .get(*i)
                .cloned()
                .unwrap_or_else(|| key.to_string()),
            CorrelationKey::Query(q) => q.clone(),
        });
        successes.sort_by_key(|result| index_of(&result.key));

        let rows: Vec<FlattenedRow> = successes.iter().map(|r| image_row(&r.body)).collect();

        info!(
            command = %Command::GetImage,
            row_count = rows.len(),
            failure_count = failures.len(),
            "Image lookup finished"
        );

        Ok(SearchOutcome {
            command: Command::GetImage,
            rows,
            failures,
            total_hits: progress.total_hits(),
        })
    }
}

fn flattener(command: Command) -> Result<&'static ResponseFlattener> {
    ResponseFlattener::for_command(command)
        .ok_or_else(|| Error::Internal(format!("no path list declared for {}", command)))
}

fn hit_origin(idx: usize) -> String {
    format!("hit {}", idx)
}

/// Split outcomes into 200 results and everything else. `origin` names the
/// request a failure belongs to.
fn partition(
    outcomes: Vec<FetchOutcome>,
    origin: impl Fn(&CorrelationKey) -> String,
) -> (Vec<FetchResult>, Vec<FetchFailure>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) if result.is_success() => successes.push(result),
            Ok(result) => failures.push(FetchFailure::rate_limited(origin(&result.key), &result)),
            Err(e) => failures.push(FetchFailure::from_error(origin(e.key()), &e)),
        }
    }
    (successes, failures)
}

fn term_position(terms: &[String], key: &CorrelationKey) -> usize {
    match key {
        CorrelationKey::Query(q) => terms.iter().position(|t| t == q).unwrap_or(usize::MAX),
        CorrelationKey::Index(i) => *i,
    }
}

fn index_of(key: &CorrelationKey) -> usize {
    match key {
        CorrelationKey::Index(i) => *i,
        CorrelationKey::Query(_) => usize::MAX,
    }
}
