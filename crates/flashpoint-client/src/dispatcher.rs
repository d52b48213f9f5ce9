//! Bounded-concurrency dispatch of many fetch items.
//!
//! A fixed pool of worker tasks pulls items from a shared queue and hands
//! each outcome back over a channel. The collector pauses for the session
//! throttle after every completion; the bounded channel turns that pause
//! into backpressure on the workers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use flashpoint_core::FetchItem;

use crate::progress::Progress;
use crate::worker::{FetchOutcome, HttpFetchWorker};

pub struct ConcurrentDispatcher {
    worker: HttpFetchWorker,
    max_workers: usize,
    throttle: Duration,
}

impl ConcurrentDispatcher {
    pub fn new(worker: HttpFetchWorker, max_workers: usize, throttle: Duration) -> Self {
        Self {
            worker,
            max_workers: max_workers.max(1),
            throttle,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Fetch every item and return one outcome per item, in completion order.
    pub async fn dispatch(&self, items: Vec<FetchItem>) -> Vec<FetchOutcome> {
        let progress = Arc::new(Progress::new(items.len()));
        self.dispatch_with_progress(items, progress).await
    }

    /// Like [`dispatch`](Self::dispatch), reporting into a caller-owned
    /// [`Progress`]. Successful outcomes add their hit count to it.
    pub async fn dispatch_with_progress(
        &self,
        items: Vec<FetchItem>,
        progress: Arc<Progress>,
    ) -> Vec<FetchOutcome> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let start = Instant::now();
        let workers = self.max_workers.min(total);
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let (tx, mut rx) = mpsc::channel::<FetchOutcome>(workers);

        info!(batch_size = total, workers, "Dispatching fetch batch");

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            let queue = queue.clone();
            let tx = tx.clone();
            let worker = self.worker.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(item) = next else { break };
                    let outcome = worker.fetch(item, Some(progress.as_ref())).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Fetch worker finished");
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            if let Ok(result) = &outcome {
                if result.is_success() {
                    let total_hits = progress.add_hits(result.hit_count);
                    debug!(
                        correlation_key = %result.key,
                        hit_count = result.hit_count,
                        total_hits,
                        "Accumulated hits"
                    );
                }
            }
            outcomes.push(outcome);

            if !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Fetch worker task failed");
            }
        }

        if outcomes.len() != total {
            error!(
                batch_size = total,
                row_count = outcomes.len(),
                "Fetch batch lost outcomes"
            );
        }

        info!(
            batch_size = total,
            completed = progress.completed(),
            total_hits = progress.total_hits(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetch batch finished"
        );

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpTransport, RawResponse};
    use crate::worker::RetryPolicy;
    use async_trait::async_trait;
    use flashpoint_core::{CorrelationKey, HttpMethod};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every request after a short delay, tracking peak concurrency.
    /// Items whose index is in `fail` get HTTP 500.
    struct CountingTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail: Vec<usize>,
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn send(&self, item: &FetchItem) -> flashpoint_core::Result<RawResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let index = match item.key() {
                CorrelationKey::Index(i) => *i,
                CorrelationKey::Query(_) => 0,
            };
            let status = if self.fail.contains(&index) { 500 } else { 200 };
            Ok(RawResponse {
                status,
                content_type: Some("image/jpeg".into()),
                body: vec![index as u8],
            })
        }
    }

    fn transport(fail: Vec<usize>) -> Arc<CountingTransport> {
        Arc::new(CountingTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail,
        })
    }

    fn items(n: usize) -> Vec<FetchItem> {
        (0..n)
            .map(|i| {
                FetchItem::new(
                    HttpMethod::Get,
                    "https://example.test/media",
                    CorrelationKey::Index(i),
                    json!({"asset_id": i.to_string()}),
                    Vec::new(),
                )
            })
            .collect()
    }

    fn dispatcher(transport: Arc<CountingTransport>, workers: usize) -> ConcurrentDispatcher {
        let worker = HttpFetchWorker::new(transport, RetryPolicy::new(3, Duration::from_millis(1)));
        ConcurrentDispatcher::new(worker, workers, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_item_yields_one_outcome() {
        let transport = transport(vec![2]);
        let outcomes = dispatcher(transport, 3).dispatch(items(7)).await;

        assert_eq!(outcomes.len(), 7);
        let mut keys: Vec<_> = outcomes
            .iter()
            .map(|o| match o {
                Ok(r) => r.key.clone(),
                Err(e) => e.key().clone(),
            })
            .collect();
        keys.sort_by_key(|k| match k {
            CorrelationKey::Index(i) => *i,
            CorrelationKey::Query(_) => usize::MAX,
        });
        assert_eq!(keys, (0..7).map(CorrelationKey::Index).collect::<Vec<_>>());
        assert_eq!(outcomes.iter().filter(|o| o.is_err()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_worker_count() {
        let transport = transport(Vec::new());
        dispatcher(transport.clone(), 3).dispatch(items(12)).await;
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hits_accumulate_only_for_successes() {
        let transport = transport(vec![0, 1]);
        let progress = Arc::new(Progress::new(5));
        dispatcher(transport, 2)
            .dispatch_with_progress(items(5), progress.clone())
            .await;

        assert_eq!(progress.total_hits(), 3);
        assert_eq!(progress.completed(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let transport = transport(Vec::new());
        let outcomes = dispatcher(transport.clone(), 4).dispatch(Vec::new()).await;
        assert!(outcomes.is_empty());
        assert_eq!(transport.peak.load(Ordering::SeqCst), 0);
    }
}
