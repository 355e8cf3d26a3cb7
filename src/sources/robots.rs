// src/sources/robots.rs
//! robots.txt handling on top of `texting_robots`, cached per origin for the life of
//! the process. A robots.txt that can't be fetched or parsed allows everything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use texting_robots::Robot;

use crate::sources::http::HttpFetcher;

pub const ROBOTS_AGENT: &str = "cdp-signal-scanner";
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed rules for one origin; `None` means no usable robots.txt.
type Rules = Option<Arc<Robot>>;

/// Parse a robots.txt body for our agent. Unparsable input yields `None`.
pub fn parse_robots(robots_txt: &str) -> Rules {
    match Robot::new(ROBOTS_AGENT, robots_txt.as_bytes()) {
        Ok(robot) => Some(Arc::new(robot)),
        Err(e) => {
            tracing::debug!(error = %e, "unparsable robots.txt, allowing");
            None
        }
    }
}

#[derive(Clone)]
pub struct RobotsCache {
    http: HttpFetcher,
    rules: Arc<Mutex<HashMap<String, Rules>>>,
}

impl RobotsCache {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            rules: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed the cache for an origin (scheme://host[:port]).
    pub fn insert(&self, origin: &str, robots_txt: &str) {
        let parsed = parse_robots(robots_txt);
        if let Ok(mut map) = self.rules.lock() {
            map.insert(origin.to_string(), parsed);
        }
    }

    /// True if robots.txt for `url`'s origin lets us fetch it.
    pub async fn allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let origin = parsed.origin().ascii_serialization();

        let cached = self
            .rules
            .lock()
            .ok()
            .and_then(|map| map.get(&origin).cloned());
        let rules = match cached {
            Some(r) => r,
            None => {
                let rules = self.fetch_rules(&origin).await;
                if let Ok(mut map) = self.rules.lock() {
                    map.insert(origin.clone(), rules.clone());
                }
                rules
            }
        };

        let allowed = rules.map_or(true, |robot| robot.allowed(url));
        if !allowed {
            tracing::debug!(url, "blocked by robots.txt");
        }
        allowed
    }

    async fn fetch_rules(&self, origin: &str) -> Rules {
        let robots_url = format!("{origin}/robots.txt");
        match self.http.try_get(&robots_url, ROBOTS_TIMEOUT).await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => parse_robots(&body),
                Err(_) => None,
            },
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, origin, "robots.txt unavailable, allowing");
                None
            }
        }
    }
}
