//! URL frontier for one crawl job
//!
//! This module handles:
//! - Canonicalization and deduplication of discovered URLs (one `CrawlState` per canonical key)
//! - Scope and depth admission
//! - Breadth-first ordering (depth, then discovery order)
//! - A bounded queue that blocks discovering workers when full
//! - The page budget, cancellation and storage-failure halts

use crate::config::SiteConfig;
use crate::state::{CancelToken, CrawlState, StopReason};
use crate::url::{canonicalize_url, ScopeExclusion, ScopeRule};
use crate::ConfigError;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// A URL waiting in (or popped from) the frontier
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Canonical URL
    pub url: Url,

    /// Depth from the nearest seed (seeds are 0)
    pub depth: u32,

    /// Canonical URL of the page the link was found on
    pub source: Option<String>,

    /// Discovery order, used to break depth ties
    seq: u64,
}

impl FrontierEntry {
    /// Deduplication key (the canonical URL string)
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

// BinaryHeap is a max-heap: the shallowest, earliest-discovered entry must compare greatest
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}

/// Why an addition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Deeper than the frontier admits
    TooDeep,
    /// Outside the scope rule
    Scope(ScopeExclusion),
}

/// Result of [`Frontier::add`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Queued for fetching
    Accepted,
    /// Canonical key already has a state in this job
    Duplicate,
    /// Recorded as `Excluded`
    Excluded(Rejection),
    /// Not an http(s) URL; nothing recorded
    Invalid,
}

/// Per-state totals of the URLs a job has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub discovered: u32,
    pub pending: u32,
    pub indexed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub excluded: u32,
}

#[derive(Debug, Default)]
struct Inner {
    queue: BinaryHeap<FrontierEntry>,
    states: HashMap<String, CrawlState>,
    next_seq: u64,
    in_flight: usize,
    dispatched: u32,
    waiting_producers: usize,
    halted: bool,
}

/// Bounded, deduplicating, breadth-first URL frontier
///
/// Owned by one job and shared by reference with its workers. Admission follows the rule that
/// pages at depth `max_depth` still have their links followed, so entries up to
/// `max_depth + 1` are accepted.
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    changed: Notify,
    scope: ScopeRule,
    admit_depth: u32,
    max_pages: u32,
    capacity: usize,
    cancel: CancelToken,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(
        scope: ScopeRule,
        max_depth: u32,
        max_pages: u32,
        capacity: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            changed: Notify::new(),
            scope,
            admit_depth: max_depth.saturating_add(1),
            max_pages,
            capacity: capacity.max(1),
            cancel,
        }
    }

    /// Creates an empty frontier from a site configuration
    pub fn from_config(config: &SiteConfig, cancel: CancelToken) -> Result<Self, ConfigError> {
        Ok(Self::new(
            ScopeRule::from_config(config)?,
            config.scope.max_depth,
            config.scope.max_pages,
            config.fetch.frontier_capacity,
            cancel,
        ))
    }

    /// Offers a discovered URL to the frontier
    ///
    /// The URL is canonicalized first. A new in-scope key is claimed as `Discovered` at once,
    /// so concurrent discoveries of the same URL coalesce; the caller then waits while the
    /// queue is full. The wait is skipped when the job is stopping, the page budget is spent,
    /// or every in-flight worker is already blocked here (nobody would be left to drain).
    pub async fn add(&self, url: &Url, depth: u32, source: Option<&Url>) -> AddOutcome {
        let Ok(url) = canonicalize_url(url) else {
            return AddOutcome::Invalid;
        };
        let key = url.as_str().to_string();

        {
            let mut inner = self.lock();
            if inner.states.contains_key(&key) {
                return AddOutcome::Duplicate;
            }

            if depth > self.admit_depth {
                inner.states.insert(key, CrawlState::Excluded);
                return AddOutcome::Excluded(Rejection::TooDeep);
            }

            if let Err(reason) = self.scope.check(&url) {
                inner.states.insert(key, CrawlState::Excluded);
                return AddOutcome::Excluded(Rejection::Scope(reason));
            }

            inner.states.insert(key, CrawlState::Discovered);
        }

        let mut entry = Some(FrontierEntry {
            url,
            depth,
            source: source.map(|s| s.to_string()),
            seq: 0,
        });

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                let must_not_wait = inner.queue.len() < self.capacity
                    || self.stopping(&inner)
                    || inner.dispatched >= self.max_pages
                    || inner.waiting_producers + 1 >= inner.in_flight;

                if must_not_wait {
                    if let Some(mut entry) = entry.take() {
                        entry.seq = inner.next_seq;
                        inner.next_seq += 1;
                        inner.queue.push(entry);
                    }
                    drop(inner);
                    self.changed.notify_waiters();
                    return AddOutcome::Accepted;
                }

                inner.waiting_producers += 1;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.cancel.cancelled() => {}
            }

            self.lock().waiting_producers -= 1;
        }
    }

    /// Takes the next URL to fetch, marking it `Fetching`
    ///
    /// Waits while the queue is empty but workers are still in flight (they may discover more).
    ///
    /// # Returns
    ///
    /// * `Some(FrontierEntry)` - The shallowest, earliest-discovered queued URL
    /// * `None` - The job is cancelled or halted, the page budget is spent, or the frontier is
    ///   exhausted
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if self.stopping(&inner) || inner.dispatched >= self.max_pages {
                    return None;
                }

                if let Some(entry) = inner.queue.pop() {
                    inner
                        .states
                        .insert(entry.key().to_string(), CrawlState::Fetching);
                    inner.in_flight += 1;
                    inner.dispatched += 1;
                    drop(inner);
                    self.changed.notify_waiters();
                    return Some(entry);
                }

                if inner.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    /// Records the terminal state of a URL handed out by [`Frontier::next`]
    pub fn complete(&self, key: &str, state: CrawlState) {
        {
            let mut inner = self.lock();
            inner.states.insert(key.to_string(), state);
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Stops dispatching after a fatal error; waiting workers wake and drain
    pub fn halt(&self) {
        self.lock().halted = true;
        self.changed.notify_waiters();
    }

    /// Current state of a canonical key, if the job has seen it
    #[cfg(test)]
    fn state_of(&self, key: &str) -> Option<CrawlState> {
        self.lock().states.get(key).copied()
    }

    /// Number of URLs handed out for fetching
    #[cfg(test)]
    fn dispatched(&self) -> u32 {
        self.lock().dispatched
    }

    /// Number of URLs waiting in the queue
    #[cfg(test)]
    fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Tallies the state of every URL seen so far
    pub fn counts(&self) -> FrontierCounts {
        let inner = self.lock();
        let mut counts = FrontierCounts {
            discovered: inner.states.len() as u32,
            ..FrontierCounts::default()
        };
        for state in inner.states.values() {
            match state {
                CrawlState::Discovered | CrawlState::Fetching => counts.pending += 1,
                CrawlState::Indexed => counts.indexed += 1,
                CrawlState::SkippedUnchanged => counts.skipped += 1,
                CrawlState::Failed => counts.failed += 1,
                CrawlState::Excluded => counts.excluded += 1,
            }
        }
        counts
    }

    /// Why dispatching stopped; meaningful once every worker has returned
    pub fn stop_reason(&self) -> StopReason {
        let inner = self.lock();
        if inner.halted {
            StopReason::StorageFailure
        } else if self.cancel.is_cancelled() {
            StopReason::Cancelled
        } else if inner.dispatched >= self.max_pages && !inner.queue.is_empty() {
            StopReason::PageBudgetReached
        } else {
            StopReason::FrontierExhausted
        }
    }

    fn stopping(&self, inner: &Inner) -> bool {
        inner.halted || self.cancel.is_cancelled()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
