use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    pub capture_ms: u64,
    pub fingerprint_ms: u64,
    pub ocr_ms: Option<u64>,
    /// Set when the capture failed and the cycle was skipped
    pub skipped_reason: Option<String>,
    pub ocr_failed: bool,
    pub total_ms: u64,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_cycles: Vec<CycleMetrics>,
    pub cycle_count: u64,
    pub skipped_count: u64,
    pub ocr_failure_count: u64,
}

impl MetricsSnapshot {
    /// Mean total cycle time over the retained window, skipped cycles excluded.
    pub fn mean_cycle_ms(&self) -> Option<f64> {
        let completed: Vec<u64> = self
            .recent_cycles
            .iter()
            .filter(|cycle| cycle.skipped_reason.is_none())
            .map(|cycle| cycle.total_ms)
            .collect();
        if completed.is_empty() {
            return None;
        }
        Some(completed.iter().sum::<u64>() as f64 / completed.len() as f64)
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            system: SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            },
            recent_cycles: Vec::new(),
            cycle_count: 0,
            skipped_count: 0,
            ocr_failure_count: 0,
        }
    }
}
