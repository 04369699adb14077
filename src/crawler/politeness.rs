//! Per-host politeness limiter
//!
//! Every host gets a semaphore bounding concurrent requests and a reserved "next start" time
//! that spaces request starts by the politeness delay. Reservations are made under a short
//! lock; the waiting itself happens outside it.

use crate::url::host_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

#[derive(Debug)]
struct HostSlot {
    permits: Arc<Semaphore>,
    next_start: Mutex<Option<Instant>>,
}

/// Held for the duration of one request; dropping it frees the host slot
#[derive(Debug)]
pub struct HostPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Per-host concurrency and request spacing, shared by all workers of one job
#[derive(Debug)]
pub struct HostLimiter {
    per_host: usize,
    delay: Duration,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

impl HostLimiter {
    /// Creates a limiter allowing `per_host` concurrent requests per host, started at least
    /// `delay` apart
    pub fn new(per_host: usize, delay: Duration) -> Self {
        Self {
            per_host: per_host.max(1),
            delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to the URL's host may start
    ///
    /// `crawl_delay` (from robots.txt) raises the spacing for this host when it exceeds the
    /// configured delay.
    pub async fn acquire(&self, url: &Url, crawl_delay: Option<Duration>) -> HostPermit {
        let key = host_key(url).unwrap_or_default();
        let slot = self.slot(&key);

        let permit = slot.permits.clone().acquire_owned().await.ok();

        let spacing = crawl_delay.map_or(self.delay, |d| d.max(self.delay));
        let start = {
            let mut next = slot.next_start.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let start = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(start + spacing);
            start
        };

        tokio::time::sleep_until(start).await;

        HostPermit { _permit: permit }
    }

    /// Number of hosts seen so far
    #[cfg(test)]
    fn host_count(&self) -> usize {
        self.hosts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn slot(&self, key: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(HostSlot {
                    permits: Arc::new(Semaphore::new(self.per_host)),
                    next_start: Mutex::new(None),
                })
            })
            .clone()
    }
}
