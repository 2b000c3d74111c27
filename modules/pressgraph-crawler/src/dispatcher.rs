// Bounded, memory-aware fetch dispatcher for one crawl phase.
//
// Every URL of a phase goes through `Dispatcher::fetch_all`; at most
// `max_in_flight` fetches run at once, new fetches wait while the memory
// gauge reports usage above the threshold, and each fetch is capped by the
// request timeout. Results come back together once the phase is done.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rand::Rng;
use tracing::{debug, info, warn};

use pressgraph_common::{CrawlSettings, FetchError, RateLimitSettings};

use crate::traits::{Fetcher, RenderOptions, RenderedPage};

// --- Memory pressure ---

pub trait MemoryGauge: Send + Sync {
    /// System memory in use, 0.0–100.0.
    fn used_percent(&self) -> f64;
}

/// Reads `/proc/meminfo`. Platforms without it report 0% used.
pub struct ProcMemoryGauge;

impl MemoryGauge for ProcMemoryGauge {
    fn used_percent(&self) -> f64 {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|text| parse_meminfo(&text))
            .unwrap_or(0.0)
    }
}

fn parse_meminfo(text: &str) -> Option<f64> {
    let field = |name: &str| {
        text.lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<f64>().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some(((total - available) / total * 100.0).clamp(0.0, 100.0))
}

// --- Rate limiting ---

/// Randomised politeness delay before each attempt, with exponential
/// backoff between retries.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self { settings }
    }

    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    /// Delay before attempt `attempt` (0-based): a uniform draw from the
    /// base range, doubled per retry, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let (low, high) = self.settings.base_delay;
        let base = if high > low {
            let millis = rand::rng().random_range(low.as_millis()..=high.as_millis());
            Duration::from_millis(millis as u64)
        } else {
            low
        };
        base.saturating_mul(2u32.saturating_pow(attempt))
            .min(self.settings.max_delay)
    }
}

// --- Dispatcher ---

pub struct Dispatcher {
    max_in_flight: usize,
    check_interval: Duration,
    memory_threshold_percent: f64,
    rate_limiter: Option<RateLimiter>,
    gauge: Arc<dyn MemoryGauge>,
}

impl Dispatcher {
    pub fn new(max_in_flight: usize, settings: &CrawlSettings) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            check_interval: settings.check_interval,
            memory_threshold_percent: settings.memory_threshold_percent,
            rate_limiter: None,
            gauge: Arc::new(ProcMemoryGauge),
        }
    }

    pub fn with_rate_limit(mut self, settings: Option<RateLimitSettings>) -> Self {
        self.rate_limiter = settings.map(RateLimiter::new);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<dyn MemoryGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    /// Fetch every URL and return one result per URL, in completion order.
    pub async fn fetch_all<F>(
        &self,
        fetcher: &F,
        urls: Vec<String>,
        options: &RenderOptions,
    ) -> Vec<(String, Result<RenderedPage, FetchError>)>
    where
        F: Fetcher + ?Sized,
    {
        let total = urls.len();
        let in_flight = AtomicUsize::new(0);
        info!(
            urls = total,
            max_in_flight = self.max_in_flight,
            rate_limited = self.rate_limiter.is_some(),
            "Dispatching fetches"
        );

        let results: Vec<_> = stream::iter(urls.into_iter().map(|url| {
            let in_flight = &in_flight;
            async move {
                self.wait_for_memory(in_flight).await;
                in_flight.fetch_add(1, Ordering::SeqCst);
                let result = self.fetch_one(fetcher, &url, options).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                (url, result)
            }
        }))
        .buffer_unordered(self.max_in_flight)
        .collect()
        .await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(urls = total, failed, "Dispatch complete");
        results
    }

    /// Hold back while memory is above the threshold, unless nothing is in
    /// flight (waiting then could never make progress).
    async fn wait_for_memory(&self, in_flight: &AtomicUsize) {
        loop {
            let used = self.gauge.used_percent();
            if used <= self.memory_threshold_percent || in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            debug!(used, threshold = self.memory_threshold_percent, "Memory pressure, waiting");
            tokio::time::sleep(self.check_interval).await;
        }
    }

    async fn fetch_one<F>(
        &self,
        fetcher: &F,
        url: &str,
        options: &RenderOptions,
    ) -> Result<RenderedPage, FetchError>
    where
        F: Fetcher + ?Sized,
    {
        let retries = self.rate_limiter.as_ref().map_or(0, RateLimiter::max_retries);
        let mut attempt = 0;
        loop {
            if let Some(limiter) = &self.rate_limiter {
                tokio::time::sleep(limiter.delay_for(attempt)).await;
            }
            let result = match tokio::time::timeout(options.timeout, fetcher.fetch(url, options)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: options.timeout.as_secs(),
                }),
            };
            match result {
                Err(e) if attempt < retries => {
                    warn!(url, attempt = attempt + 1, error = %e, "Fetch failed, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meminfo_usage_is_computed() {
        let text = "MemTotal:       1000 kB\nMemFree:         100 kB\nMemAvailable:    250 kB\n";
        assert_eq!(parse_meminfo(text), Some(75.0));
        assert_eq!(parse_meminfo("garbage"), None);
    }

    #[test]
    fn backoff_is_capped() {
        let limiter = RateLimiter::new(RateLimitSettings {
            base_delay: (Duration::from_secs(8), Duration::from_secs(10)),
            max_delay: Duration::from_secs(30),
            max_retries: 2,
        });
        let first = limiter.delay_for(0);
        assert!(first >= Duration::from_secs(8) && first <= Duration::from_secs(10));
        assert!(limiter.delay_for(1) >= Duration::from_secs(16));
        assert_eq!(limiter.delay_for(5), Duration::from_secs(30));
    }

    #[test]
    fn fixed_base_delay_is_used_as_is() {
        let limiter = RateLimiter::new(RateLimitSettings {
            base_delay: (Duration::from_millis(5), Duration::from_millis(5)),
            max_delay: Duration::from_secs(1),
            max_retries: 0,
        });
        assert_eq!(limiter.delay_for(0), Duration::from_millis(5));
    }
}
