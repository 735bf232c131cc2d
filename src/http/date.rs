//! Cached `Date` header value.
//!
//! Formatting a date per response is wasteful; the value only changes once a
//! second. A background task refreshes it and connections read the latest
//! snapshot lock-free.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Shared RFC 1123 date string, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
#[derive(Debug)]
pub struct DateCache {
    value: ArcSwap<String>,
}

impl DateCache {
    pub fn new() -> Self {
        Self {
            value: ArcSwap::from_pointee(format_now()),
        }
    }

    /// Current value.
    pub fn value(&self) -> Arc<String> {
        self.value.load_full()
    }

    pub fn refresh(&self) {
        self.value.store(Arc::new(format_now()));
    }

    /// Refresh every second until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh(),
                _ = shutdown.recv() => {
                    tracing::debug!("Date cache stopping");
                    break;
                }
            }
        }
    }
}

impl Default for DateCache {
    fn default() -> Self {
        Self::new()
    }
}

fn format_now() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}
