//! # flashpoint-client
//!
//! Fetching and orchestration for the Flashpoint search client.
//!
//! - [`transport`]: the HTTP seam (`HttpTransport`, reqwest implementation)
//! - [`worker`]: single-item fetch with exponential backoff on HTTP 429
//! - [`dispatcher`]: bounded worker pool over a shared queue
//! - [`orchestrator`]: per-command fetch plans and result shaping
//! - [`integration`]: `Integration::run(command_text, instance)` for hosts
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashpoint_client::Integration;
//! use flashpoint_core::SessionConfig;
//!
//! # async fn example() -> flashpoint_core::Result<()> {
//! let mut integration = Integration::new();
//! integration.register_instance("default", SessionConfig::from_env()?)?;
//!
//! let (rows, status) = integration
//!     .run("search_chat -q 'bank drop' -s 2024-01-01 -l 10", "default")
//!     .await;
//! println!("{} ({} rows)", status, rows.map(|r| r.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod integration;
pub mod orchestrator;
pub mod payload;
pub mod progress;
pub mod transport;
pub mod worker;

pub use dispatcher::ConcurrentDispatcher;
pub use integration::{Integration, RunOutput};
pub use orchestrator::{FetchFailure, SearchOrchestrator, SearchOutcome, QUERY_COLUMN};
pub use progress::{Progress, ProgressEvent};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};
pub use worker::{FetchError, FetchOutcome, HttpFetchWorker, RetryPolicy};
