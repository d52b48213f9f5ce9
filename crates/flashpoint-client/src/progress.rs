//! Shared progress counter for a batch of fetches.
//!
//! Many workers complete items concurrently, so every counter is an atomic
//! and each update is a single increment-and-read. Observers (a notebook
//! progress bar, the CLI) subscribe to a broadcast channel of events.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;

use flashpoint_core::defaults::PROGRESS_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One more item reached a terminal state.
    ItemCompleted { completed: usize, total: usize },
    /// Aggregate hit count changed.
    HitsUpdated { total_hits: usize },
}

#[derive(Debug)]
pub struct Progress {
    total: usize,
    completed: AtomicUsize,
    total_hits: AtomicUsize,
    events: broadcast::Sender<ProgressEvent>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        let (events, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self::with_sender(total, events)
    }

    /// Report into an existing channel, so subscribers outlive the batch.
    pub fn with_sender(total: usize, events: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            total_hits: AtomicUsize::new(0),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Count one completed item; returns the new completed count.
    pub fn record_completion(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.events.send(ProgressEvent::ItemCompleted {
            completed,
            total: self.total,
        });
        completed
    }

    /// Add to the aggregate hit count; returns the new total.
    pub fn add_hits(&self, hits: usize) -> usize {
        let total_hits = self.total_hits.fetch_add(hits, Ordering::SeqCst) + hits;
        let _ = self.events.send(ProgressEvent::HitsUpdated { total_hits });
        total_hits
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits.load(Ordering::SeqCst)
    }
}
