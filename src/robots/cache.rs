//! Per-job robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per job. Concurrent workers asking for the
//! same host wait on the single in-flight fetch.

use crate::crawler::http_fetch;
use crate::robots::ParsedRobots;
use crate::url::{host_key, origin_of};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Robots.txt rules for every host a job has touched
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    timeout: Duration,
    hosts: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates an empty cache that fetches with the given client
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the robots.txt rules for the URL's host, fetching them on first use
    ///
    /// A missing (4xx), failing (5xx) or unreachable robots.txt allows everything.
    pub async fn rules_for(&self, url: &Url) -> Arc<ParsedRobots> {
        let Some(key) = host_key(url) else {
            return Arc::new(ParsedRobots::allow_all());
        };

        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts.entry(key).or_default().clone()
        };

        slot.get_or_init(|| async { Arc::new(self.fetch(url).await) })
            .await
            .clone()
    }

    /// Number of hosts whose robots.txt has been resolved
    #[cfg(test)]
    fn len(&self) -> usize {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.values().filter(|slot| slot.initialized()).count()
    }

    async fn fetch(&self, url: &Url) -> ParsedRobots {
        let Some(robots_url) = origin_of(url).and_then(|o| Url::parse(&format!("{}/robots.txt", o)).ok())
        else {
            return ParsedRobots::allow_all();
        };

        match http_fetch(&self.client, &robots_url, self.timeout).await {
            Ok(response) => {
                debug!("Fetched {} ({} bytes)", robots_url, response.body.len());
                ParsedRobots::from_content(&response.text())
            }
            Err(e) => {
                debug!("No usable robots.txt at {}: {}", robots_url, e);
                if !e.is_client_error() {
                    warn!("robots.txt unavailable at {}, allowing all: {}", robots_url, e);
                }
                ParsedRobots::allow_all()
            }
        }
    }
}
