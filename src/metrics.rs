//! Request counters, duration quantiles, and Prometheus exposition.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::breaker::BreakerSnapshot;
use crate::cache::CacheStats;

/// Ring buffer size for duration samples used in quantile estimation.
const DURATION_SAMPLES: usize = 1_000;

pub const SERVER_NAME: &str = "lanonasis-mcp-gateway";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
struct ToolCounters {
    requests: HashMap<String, u64>,
    errors: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    total_requests: AtomicU64,
    tools: Mutex<ToolCounters>,
    durations_ms: Mutex<VecDeque<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            tools: Mutex::new(ToolCounters::default()),
            durations_ms: Mutex::new(VecDeque::with_capacity(DURATION_SAMPLES)),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self, tool: &str) {
        let mut tools = self.tools.lock().expect("metrics lock poisoned");
        *tools.requests.entry(tool.to_string()).or_insert(0) += 1;
    }

    pub fn record_tool_error(&self, tool: &str) {
        let mut tools = self.tools.lock().expect("metrics lock poisoned");
        *tools.errors.entry(tool.to_string()).or_insert(0) += 1;
    }

    pub fn record_duration(&self, elapsed: Duration) {
        let mut durations = self.durations_ms.lock().expect("metrics lock poisoned");
        if durations.len() == DURATION_SAMPLES {
            durations.pop_front();
        }
        durations.push_back(elapsed.as_secs_f64() * 1_000.0);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn tool_requests(&self, tool: &str) -> u64 {
        self.tools
            .lock()
            .expect("metrics lock poisoned")
            .requests
            .get(tool)
            .copied()
            .unwrap_or(0)
    }

    fn duration_summary(&self) -> DurationSummary {
        let durations = self.durations_ms.lock().expect("metrics lock poisoned");
        let mut sorted: Vec<f64> = durations.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let quantile = |q: f64| -> f64 {
            if sorted.is_empty() {
                return 0.0;
            }
            let rank = ((count as f64 - 1.0) * q).round() as usize;
            sorted[rank.min(count - 1)]
        };
        DurationSummary {
            count: count as u64,
            sum_ms: sum,
            avg_ms: if count == 0 { 0.0 } else { sum / count as f64 },
            p50_ms: quantile(0.50),
            p95_ms: quantile(0.95),
            p99_ms: quantile(0.99),
        }
    }

    /// Resident/virtual memory of this process, via sysinfo.
    fn memory_snapshot() -> MemorySnapshot {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return MemorySnapshot::default();
        };
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid) {
            Some(process) => MemorySnapshot {
                rss_bytes: process.memory(),
                virtual_bytes: process.virtual_memory(),
            },
            None => MemorySnapshot::default(),
        }
    }

    /// Prometheus text exposition, format version 0.0.4.
    pub fn render_prometheus(&self, breakers: &[BreakerSnapshot], caches: &[CacheStats]) -> String {
        let memory = Self::memory_snapshot();
        let durations = self.duration_summary();
        let tools = self.tools.lock().expect("metrics lock poisoned");
        let mut out = String::with_capacity(4_096);

        let _ = writeln!(out, "# HELP mcp_server_info Gateway build information");
        let _ = writeln!(out, "# TYPE mcp_server_info gauge");
        let _ = writeln!(
            out,
            "mcp_server_info{{version=\"{SERVER_VERSION}\",server=\"{SERVER_NAME}\"}} 1"
        );

        let _ = writeln!(out, "# HELP mcp_uptime_seconds Gateway uptime in seconds");
        let _ = writeln!(out, "# TYPE mcp_uptime_seconds counter");
        let _ = writeln!(out, "mcp_uptime_seconds {}", self.uptime().as_secs());

        let _ = writeln!(out, "# HELP mcp_memory_bytes Process memory usage");
        let _ = writeln!(out, "# TYPE mcp_memory_bytes gauge");
        let _ = writeln!(out, "mcp_memory_bytes{{type=\"rss\"}} {}", memory.rss_bytes);
        let _ = writeln!(
            out,
            "mcp_memory_bytes{{type=\"heap_total\"}} {}",
            memory.virtual_bytes
        );
        let _ = writeln!(
            out,
            "mcp_memory_bytes{{type=\"heap_used\"}} {}",
            memory.rss_bytes
        );
        let _ = writeln!(out, "mcp_memory_bytes{{type=\"external\"}} 0");

        let _ = writeln!(out, "# HELP mcp_requests_total Total requests handled");
        let _ = writeln!(out, "# TYPE mcp_requests_total counter");
        let _ = writeln!(out, "mcp_requests_total {}", self.total_requests());

        let _ = writeln!(out, "# HELP mcp_tool_requests_total Tool calls by name");
        let _ = writeln!(out, "# TYPE mcp_tool_requests_total counter");
        let mut names: Vec<_> = tools.requests.iter().collect();
        names.sort_by_key(|(name, _)| name.as_str());
        for (name, count) in names {
            let _ = writeln!(out, "mcp_tool_requests_total{{tool=\"{name}\"}} {count}");
        }

        let _ = writeln!(out, "# HELP mcp_tool_errors_total Tool call failures by name");
        let _ = writeln!(out, "# TYPE mcp_tool_errors_total counter");
        let mut errors: Vec<_> = tools.errors.iter().collect();
        errors.sort_by_key(|(name, _)| name.as_str());
        for (name, count) in errors {
            let _ = writeln!(out, "mcp_tool_errors_total{{tool=\"{name}\"}} {count}");
        }

        let _ = writeln!(out, "# HELP mcp_request_duration_ms Tool call duration summary");
        let _ = writeln!(out, "# TYPE mcp_request_duration_ms summary");
        let _ = writeln!(
            out,
            "mcp_request_duration_ms{{quantile=\"0.5\"}} {:.3}",
            durations.p50_ms
        );
        let _ = writeln!(
            out,
            "mcp_request_duration_ms{{quantile=\"0.95\"}} {:.3}",
            durations.p95_ms
        );
        let _ = writeln!(
            out,
            "mcp_request_duration_ms{{quantile=\"0.99\"}} {:.3}",
            durations.p99_ms
        );
        let _ = writeln!(out, "mcp_request_duration_ms_sum {:.3}", durations.sum_ms);
        let _ = writeln!(out, "mcp_request_duration_ms_count {}", durations.count);
        let _ = writeln!(out, "# HELP mcp_request_duration_avg_ms Mean tool call duration");
        let _ = writeln!(out, "# TYPE mcp_request_duration_avg_ms gauge");
        let _ = writeln!(out, "mcp_request_duration_avg_ms {:.3}", durations.avg_ms);

        let _ = writeln!(
            out,
            "# HELP mcp_circuit_breaker_state Breaker state (0=closed, 1=half-open, 2=open)"
        );
        let _ = writeln!(out, "# TYPE mcp_circuit_breaker_state gauge");
        for breaker in breakers {
            let _ = writeln!(
                out,
                "mcp_circuit_breaker_state{{breaker=\"{}\"}} {}",
                breaker.name,
                breaker.state.gauge()
            );
        }
        let _ = writeln!(
            out,
            "# HELP mcp_circuit_breaker_failures_total Lifetime breaker failures"
        );
        let _ = writeln!(out, "# TYPE mcp_circuit_breaker_failures_total counter");
        for breaker in breakers {
            let _ = writeln!(
                out,
                "mcp_circuit_breaker_failures_total{{breaker=\"{}\"}} {}",
                breaker.name, breaker.total_failures
            );
        }

        let _ = writeln!(out, "# HELP mcp_cache_size Current cache entry count");
        let _ = writeln!(out, "# TYPE mcp_cache_size gauge");
        for cache in caches {
            let _ = writeln!(out, "mcp_cache_size{{cache=\"{}\"}} {}", cache.name, cache.size);
        }
        let _ = writeln!(out, "# HELP mcp_cache_hits_total Cache hits");
        let _ = writeln!(out, "# TYPE mcp_cache_hits_total counter");
        for cache in caches {
            let _ = writeln!(
                out,
                "mcp_cache_hits_total{{cache=\"{}\"}} {}",
                cache.name, cache.hits
            );
        }
        let _ = writeln!(out, "# HELP mcp_cache_misses_total Cache misses");
        let _ = writeln!(out, "# TYPE mcp_cache_misses_total counter");
        for cache in caches {
            let _ = writeln!(
                out,
                "mcp_cache_misses_total{{cache=\"{}\"}} {}",
                cache.name, cache.misses
            );
        }

        out
    }

    /// JSON mirror of the exposition for `/health/metrics`.
    pub fn snapshot_json(
        &self,
        breakers: &[BreakerSnapshot],
        caches: &[CacheStats],
        request_id: &str,
    ) -> Value {
        let memory = Self::memory_snapshot();
        let durations = self.duration_summary();
        let tools = self.tools.lock().expect("metrics lock poisoned");
        json!({
            "server": SERVER_NAME,
            "version": SERVER_VERSION,
            "requestId": request_id,
            "uptimeSeconds": self.uptime().as_secs(),
            "memory": {
                "rss": memory.rss_bytes,
                "heapTotal": memory.virtual_bytes,
                "heapUsed": memory.rss_bytes,
                "external": 0,
            },
            "requests": {
                "total": self.total_requests(),
                "byTool": tools.requests,
                "errorsByTool": tools.errors,
                "duration": {
                    "count": durations.count,
                    "avgMs": durations.avg_ms,
                    "p50Ms": durations.p50_ms,
                    "p95Ms": durations.p95_ms,
                    "p99Ms": durations.p99_ms,
                },
            },
            "circuitBreakers": breakers,
            "caches": caches,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct MemorySnapshot {
    rss_bytes: u64,
    virtual_bytes: u64,
}

#[derive(Debug)]
struct DurationSummary {
    count: u64,
    sum_ms: f64,
    avg_ms: f64,
    p50_ms: f64,
    p95_ms: f64,
    p99_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_tool_call("list_memories");
        metrics.record_tool_call("list_memories");
        metrics.record_tool_error("list_memories");
        assert_eq!(metrics.total_requests(), 2);
        assert_eq!(metrics.tool_requests("list_memories"), 2);
    }

    #[test]
    fn duration_ring_is_bounded() {
        let metrics = Metrics::new();
        for i in 0..2_000u64 {
            metrics.record_duration(Duration::from_millis(i));
        }
        let durations = metrics.durations_ms.lock().unwrap();
        assert_eq!(durations.len(), DURATION_SAMPLES);
        // Oldest samples were dropped.
        assert!(durations.front().copied().unwrap() >= 1_000.0);
    }

    #[test]
    fn quantiles_track_the_distribution() {
        let metrics = Metrics::new();
        for i in 1..=100u64 {
            metrics.record_duration(Duration::from_millis(i));
        }
        let summary = metrics.duration_summary();
        assert_eq!(summary.count, 100);
        assert!((summary.avg_ms - 50.5).abs() < 0.01);
        assert!(summary.p50_ms >= 49.0 && summary.p50_ms <= 52.0);
        assert!(summary.p99_ms >= 98.0);
    }

    #[test]
    fn prometheus_exposition_includes_required_families() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_tool_call("get_memory");
        metrics.record_duration(Duration::from_millis(12));

        let registry = crate::breaker::BreakerRegistry::with_defaults();
        let caches = crate::cache::GatewayCaches::new();
        let cache_stats: Vec<_> = caches.all().iter().map(|c| c.stats()).collect();
        let text = metrics.render_prometheus(&registry.snapshots(), &cache_stats);

        for family in [
            "mcp_server_info{",
            "mcp_uptime_seconds",
            "mcp_memory_bytes{type=\"rss\"}",
            "mcp_memory_bytes{type=\"heap_total\"}",
            "mcp_memory_bytes{type=\"heap_used\"}",
            "mcp_memory_bytes{type=\"external\"}",
            "mcp_requests_total 1",
            "mcp_tool_requests_total{tool=\"get_memory\"} 1",
            "mcp_request_duration_ms{quantile=\"0.5\"}",
            "mcp_request_duration_ms{quantile=\"0.95\"}",
            "mcp_request_duration_ms{quantile=\"0.99\"}",
            "mcp_circuit_breaker_state{breaker=\"api\"} 0",
            "mcp_circuit_breaker_state{breaker=\"edgeFunctions\"} 0",
            "mcp_circuit_breaker_failures_total{breaker=\"api\"} 0",
            "mcp_cache_size{cache=\"memoryList\"} 0",
            "mcp_cache_hits_total{cache=\"stats\"} 0",
        ] {
            assert!(text.contains(family), "missing {family} in:\n{text}");
        }
    }
}
