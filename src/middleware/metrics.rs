//! Request metrics: counters, per-path latency samples with percentiles,
//! and periodic process-memory polling.

use axum::body::Body;
use axum::extract::Request;
use axum::http::Response;
use axum::middleware::Next;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub slow_request_threshold: Duration,
    pub memory_alert_threshold: u64,
    pub max_stored_samples: usize,
    pub memory_check_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold: Duration::from_secs(2),
            memory_alert_threshold: 100 * 1024 * 1024,
            max_stored_samples: 100,
            memory_check_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    active_requests: i64,
    slow_requests: u64,
    memory_usage: u64,
    last_memory_check: Option<DateTime<Utc>>,
    status_counts: HashMap<u16, u64>,
    endpoint_counts: HashMap<String, u64>,
    response_times: HashMap<String, VecDeque<Duration>>,
}

pub struct MetricsRegistry {
    config: MetricsConfig,
    inner: RwLock<MetricsInner>,
}

/// JSON snapshot served at the metrics endpoint.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub active_requests: i64,
    pub slow_requests: u64,
    pub memory_usage_bytes: u64,
    pub status_code_counts: HashMap<u16, u64>,
    pub endpoint_counts: HashMap<String, u64>,
    pub response_time_summary: HashMap<String, ResponseTimeStat>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ResponseTimeStat {
    pub count: usize,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl MetricsRegistry {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(MetricsInner::default()),
        }
    }

    fn request_started(&self, path: &str) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.total_requests += 1;
        inner.active_requests += 1;
        *inner.endpoint_counts.entry(path.to_string()).or_insert(0) += 1;
    }

    fn request_finished(&self, path: &str, status: u16, elapsed: Duration) {
        let max_samples = self.config.max_stored_samples;
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.active_requests -= 1;
        *inner.status_counts.entry(status).or_insert(0) += 1;

        let samples = inner
            .response_times
            .entry(path.to_string())
            .or_insert_with(VecDeque::new);
        samples.push_back(elapsed);
        while samples.len() > max_samples {
            samples.pop_front();
        }

        if elapsed > self.config.slow_request_threshold {
            inner.slow_requests += 1;
            tracing::warn!(
                path,
                response_time_ms = elapsed.as_secs_f64() * 1000.0,
                "slow request detected"
            );
        }
    }

    fn record_memory(&self, bytes: u64) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.memory_usage = bytes;
        inner.last_memory_check = Some(Utc::now());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().expect("metrics lock poisoned");

        let mut summary = HashMap::new();
        for (path, times) in &inner.response_times {
            if times.is_empty() {
                continue;
            }
            let mut sorted: Vec<Duration> = times.iter().copied().collect();
            sorted.sort_unstable();

            let to_ms = |d: Duration| d.as_secs_f64() * 1000.0;
            let total: Duration = sorted.iter().sum();

            summary.insert(
                path.clone(),
                ResponseTimeStat {
                    count: sorted.len(),
                    average_ms: to_ms(total) / sorted.len() as f64,
                    min_ms: to_ms(sorted[0]),
                    max_ms: to_ms(*sorted.last().expect("non-empty")),
                    p95_ms: to_ms(percentile(&sorted, 95)),
                    p99_ms: to_ms(percentile(&sorted, 99)),
                },
            );
        }

        MetricsSnapshot {
            total_requests: inner.total_requests,
            active_requests: inner.active_requests,
            slow_requests: inner.slow_requests,
            memory_usage_bytes: inner.memory_usage,
            status_code_counts: inner.status_counts.clone(),
            endpoint_counts: inner.endpoint_counts.clone(),
            response_time_summary: summary,
            last_updated: Utc::now(),
        }
    }

    /// Poll resident memory on an interval, alerting above the threshold.
    pub fn spawn_memory_monitor(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.config.memory_check_interval);
            loop {
                interval.tick().await;
                let bytes = read_resident_memory();
                registry.record_memory(bytes);
                if bytes > registry.config.memory_alert_threshold {
                    tracing::warn!(current_memory = bytes, "high memory usage detected");
                }
            }
        })
    }
}

/// `sorted` must be ascending and non-empty.
fn percentile(sorted: &[Duration], p: usize) -> Duration {
    let index = ((sorted.len() as f64) * (p as f64) / 100.0 + 0.5) as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Resident set size from /proc; 0 where unavailable.
fn read_resident_memory() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(resident_pages) = statm.split_whitespace().nth(1) {
                if let Ok(pages) = resident_pages.parse::<u64>() {
                    return pages * 4096;
                }
            }
        }
    }
    0
}

pub async fn track_metrics(
    registry: Arc<MetricsRegistry>,
    req: Request,
    next: Next,
) -> Response<Body> {
    let path = req.uri().path().to_string();
    registry.request_started(&path);

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    registry.request_finished(&path, response.status().as_u16(), elapsed);
    response
}
