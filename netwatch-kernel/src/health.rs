use crate::aggregator::AggregationStrategy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub recomputations: u64,
    pub last_refresh_error: Option<String>,
    pub memory_usage_mb: f32,
    pub strategy: String,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    strategy: AggregationStrategy,
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
    recomputations: Arc<AtomicU64>,
    last_refresh_error: Arc<Mutex<Option<String>>>,
}

impl HealthTracker {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self {
            start_time: Instant::now(),
            strategy,
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            recomputations: Arc::new(AtomicU64::new(0)),
            last_refresh_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Recalcul réussi : efface la dernière erreur
    pub fn record_recompute(&self) {
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        *self.last_refresh_error.lock() = None;
    }

    pub fn record_refresh_error(&self, error: &str) {
        *self.last_refresh_error.lock() = Some(error.to_string());
    }

    pub fn get_health(&self) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            recomputations: self.recomputations.load(Ordering::Relaxed),
            last_refresh_error: self.last_refresh_error.lock().clone(),
            memory_usage_mb: get_memory_usage_mb(),
            strategy: self.strategy.to_string(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<u64>() {
                            return (kb as f32) / 1024.0; // KB -> MB
                        }
                    }
                }
            }
        }
    }

    0.0
}
