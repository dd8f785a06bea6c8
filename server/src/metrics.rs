// Metrics collection and tracking

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of latency samples kept for percentile estimates.
const MAX_LATENCY_SAMPLES: usize = 1024;

/// Time-to-first-audio statistics across streams.
#[derive(Debug, Clone)]
pub struct LatencyMetrics {
    pub count: Arc<AtomicU64>,
    pub total_ms: Arc<AtomicU64>,
    pub min_ms: Arc<AtomicU64>,
    pub max_ms: Arc<AtomicU64>,
    samples: Arc<Mutex<VecDeque<u64>>>,
}

impl LatencyMetrics {
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicU64::new(0)),
            total_ms: Arc::new(AtomicU64::new(0)),
            min_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_ms: Arc::new(AtomicU64::new(0)),
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES))),
        }
    }

    pub fn record(&self, latency_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.samples.lock() {
            if samples.len() == MAX_LATENCY_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(latency_ms);
        }
    }

    pub fn avg_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn min(&self) -> u64 {
        match self.min_ms.load(Ordering::Relaxed) {
            u64::MAX => 0,
            v => v,
        }
    }

    pub fn percentile(&self, p: u8) -> u64 {
        let Ok(samples) = self.samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }
}

impl Default for LatencyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the text-to-audio relay.
#[derive(Debug, Clone, Default)]
pub struct RelayMetrics {
    pub requests: Arc<AtomicU64>,
    pub bad_requests: Arc<AtomicU64>,
    pub active_streams: Arc<AtomicU64>,
    pub completed_streams: Arc<AtomicU64>,
    pub cancelled_streams: Arc<AtomicU64>,
    pub sentences_emitted: Arc<AtomicU64>,
    pub audio_bytes_emitted: Arc<AtomicU64>,
    pub audio_ms_emitted: Arc<AtomicU64>,
    pub dropped_fragments: Arc<AtomicU64>,
    pub upstream_connect_failures: Arc<AtomicU64>,
    pub upstream_read_failures: Arc<AtomicU64>,
    pub synthesis_failures: Arc<AtomicU64>,
}

impl RelayMetrics {
    pub fn record_emitted(&self, bytes: usize, duration_ms: u64) {
        self.sentences_emitted.fetch_add(1, Ordering::Relaxed);
        self.audio_bytes_emitted
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.audio_ms_emitted.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn stream_started(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_finished(&self) {
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }
}

/// All metrics owned by the application state.
#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub relay: RelayMetrics,
    pub first_audio: LatencyMetrics,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            relay: RelayMetrics::default(),
            first_audio: LatencyMetrics::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsResponse {
        let load = |c: &Arc<AtomicU64>| c.load(Ordering::Relaxed);
        let relay = &self.relay;

        MetricsResponse {
            timestamp: Utc::now(),
            started_at: self.started_at,
            uptime_seconds: self.uptime_seconds(),
            system: SystemMetrics::collect(),
            relay: RelayStats {
                requests: load(&relay.requests),
                bad_requests: load(&relay.bad_requests),
                active_streams: load(&relay.active_streams),
                completed_streams: load(&relay.completed_streams),
                cancelled_streams: load(&relay.cancelled_streams),
                sentences_emitted: load(&relay.sentences_emitted),
                audio_bytes_emitted: load(&relay.audio_bytes_emitted),
                audio_ms_emitted: load(&relay.audio_ms_emitted),
                dropped_fragments: load(&relay.dropped_fragments),
                upstream_connect_failures: load(&relay.upstream_connect_failures),
                upstream_read_failures: load(&relay.upstream_read_failures),
                synthesis_failures: load(&relay.synthesis_failures),
            },
            first_audio_latency: LatencyStats {
                count: load(&self.first_audio.count),
                avg_ms: self.first_audio.avg_ms(),
                min_ms: self.first_audio.min(),
                max_ms: load(&self.first_audio.max_ms),
                p50_ms: self.first_audio.percentile(50),
                p95_ms: self.first_audio.percentile(95),
            },
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub system: SystemMetrics,
    pub relay: RelayStats,
    pub first_audio_latency: LatencyStats,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
}

impl SystemMetrics {
    fn collect() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let used = system.used_memory();
        let total = system.total_memory();
        let memory_usage_percent = if total > 0 {
            (used as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };
        Self {
            memory_used_mb: used / 1024 / 1024,
            memory_total_mb: total / 1024 / 1024,
            memory_usage_percent,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RelayStats {
    pub requests: u64,
    pub bad_requests: u64,
    pub active_streams: u64,
    pub completed_streams: u64,
    pub cancelled_streams: u64,
    pub sentences_emitted: u64,
    pub audio_bytes_emitted: u64,
    pub audio_ms_emitted: u64,
    pub dropped_fragments: u64,
    pub upstream_connect_failures: u64,
    pub upstream_read_failures: u64,
    pub synthesis_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}
