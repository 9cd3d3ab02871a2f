//! Quality Gate Metrics: rolling-window aggregation over rubric outcomes,
//! retrieval reproducibility, policy-guard severity, and workflow latency.
//!
//! Grounded on `metrics_tracker.py`'s `QualityGateMetrics`.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GateState, GateStatus};

const WINDOW_SIZE: usize = 200;
const MIN_SAMPLES: usize = 10;

const GATE_A_TARGET: f64 = 0.95;
const GATE_B_TARGET: f64 = 0.99;
const GATE_D_TARGET_MS: f64 = 60_000.0;

/// One recorded observation in a rolling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub metadata: serde_json::Value,
}

struct Window {
    samples: VecDeque<MetricSnapshot>,
}

impl Window {
    fn new() -> Self {
        Self { samples: VecDeque::with_capacity(WINDOW_SIZE) }
    }

    fn push(&mut self, value: f64, metadata: serde_json::Value, now: DateTime<Utc>) {
        if self.samples.len() >= WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(MetricSnapshot { timestamp: now, value, metadata });
    }

    fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Nearest-rank P95 over `values` (already a flat, pooled sample set, *not*
/// per-group): `sorted[floor(n * 0.95)]`, not linear interpolation.
fn nearest_rank_p95(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() as f64) * 0.95).floor() as usize;
    let idx = idx.min(sorted.len() - 1);
    sorted[idx]
}

/// Rolling-window aggregator behind four gates (A: rubric pass rate, B:
/// reproducibility, C: policy severity, D: latency P95). Each history is a
/// bounded append-only ring buffer guarded by its own mutex (§5 concurrency
/// notes); percentile evaluations snapshot the buffer under the lock and
/// compute outside it.
pub struct QualityGateMetrics {
    rubric_pass: Mutex<Window>,
    reproducibility: Mutex<Window>,
    policy_high_severity: Mutex<Window>,
    latency: Mutex<Window>,
}

impl Default for QualityGateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityGateMetrics {
    pub fn new() -> Self {
        Self {
            rubric_pass: Mutex::new(Window::new()),
            reproducibility: Mutex::new(Window::new()),
            policy_high_severity: Mutex::new(Window::new()),
            latency: Mutex::new(Window::new()),
        }
    }

    pub fn record_rubric_result(&self, genre: &str, passed: bool, now: DateTime<Utc>) {
        let value = if passed { 1.0 } else { 0.0 };
        self.rubric_pass
            .lock()
            .expect("rubric_pass mutex poisoned")
            .push(value, serde_json::json!({ "genre": genre }), now);
    }

    pub fn record_reproducibility(&self, rate: f64, now: DateTime<Utc>) {
        self.reproducibility
            .lock()
            .expect("reproducibility mutex poisoned")
            .push(rate.clamp(0.0, 1.0), serde_json::json!({}), now);
    }

    /// `strong_count` and `extreme_count` from one policy-guard pass; the
    /// gate sums `strong + extreme` as "high severity" (§4.8).
    pub fn record_policy_violation(&self, strong_count: u32, extreme_count: u32, now: DateTime<Utc>) {
        let high_severity = (strong_count + extreme_count) as f64;
        self.policy_high_severity.lock().expect("policy mutex poisoned").push(
            high_severity,
            serde_json::json!({ "strong": strong_count, "extreme": extreme_count }),
            now,
        );
    }

    pub fn record_latency(&self, phase: &str, duration_ms: f64, now: DateTime<Utc>) {
        self.latency
            .lock()
            .expect("latency mutex poisoned")
            .push(duration_ms, serde_json::json!({ "phase": phase }), now);
    }

    fn gate_a(&self, now: DateTime<Utc>) -> GateStatus {
        let values = self.rubric_pass.lock().expect("rubric_pass mutex poisoned").values();
        if values.len() < MIN_SAMPLES {
            return insufficient_data("rubric_pass_rate", values.len(), now);
        }
        let rate = mean(&values);
        let status = if rate >= GATE_A_TARGET { GateState::Pass } else { GateState::Fail };
        GateStatus {
            name: "rubric_pass_rate".to_string(),
            status,
            current_value: rate,
            target_value: GATE_A_TARGET,
            message: format!("Pass rate: {:.2}% (target: >={:.2}%)", rate * 100.0, GATE_A_TARGET * 100.0),
            last_updated: now,
        }
    }

    fn gate_b(&self, now: DateTime<Utc>) -> GateStatus {
        let values = self.reproducibility.lock().expect("reproducibility mutex poisoned").values();
        if values.len() < MIN_SAMPLES {
            return insufficient_data("reproducibility_rate", values.len(), now);
        }
        let rate = mean(&values);
        let status = if rate >= GATE_B_TARGET { GateState::Pass } else { GateState::Fail };
        GateStatus {
            name: "reproducibility_rate".to_string(),
            status,
            current_value: rate,
            target_value: GATE_B_TARGET,
            message: format!("Reproducibility: {:.2}% (target: >={:.2}%)", rate * 100.0, GATE_B_TARGET * 100.0),
            last_updated: now,
        }
    }

    fn gate_c(&self, now: DateTime<Utc>) -> GateStatus {
        let values = self.policy_high_severity.lock().expect("policy mutex poisoned").values();
        if values.len() < MIN_SAMPLES {
            return insufficient_data("high_severity_violations", values.len(), now);
        }
        let total: f64 = values.iter().sum();
        let status = if total == 0.0 { GateState::Pass } else { GateState::Fail };
        GateStatus {
            name: "high_severity_violations".to_string(),
            status,
            current_value: total,
            target_value: 0.0,
            message: format!("High-severity violations in window: {total:.0} (target: 0)"),
            last_updated: now,
        }
    }

    fn gate_d(&self, now: DateTime<Utc>) -> GateStatus {
        let values = self.latency.lock().expect("latency mutex poisoned").values();
        if values.len() < MIN_SAMPLES {
            return insufficient_data("latency_p95_ms", values.len(), now);
        }
        let p95 = nearest_rank_p95(&values);
        let status = if p95 <= GATE_D_TARGET_MS { GateState::Pass } else { GateState::Fail };
        GateStatus {
            name: "latency_p95_ms".to_string(),
            status,
            current_value: p95,
            target_value: GATE_D_TARGET_MS,
            message: format!("P95 latency: {p95:.0}ms (target: <={GATE_D_TARGET_MS:.0}ms)"),
            last_updated: now,
        }
    }

    /// Every gate's current status, evaluated at `now`.
    pub fn get_gate_status(&self, now: DateTime<Utc>) -> Vec<GateStatus> {
        vec![self.gate_a(now), self.gate_b(now), self.gate_c(now), self.gate_d(now)]
    }

    /// Aggregate summary: `fail` if any gate fails, else `unknown` if any
    /// gate is unknown, else `pass`; plus a human-readable one-liner.
    pub fn get_metrics_summary(&self, now: DateTime<Utc>) -> (GateState, String) {
        let gates = self.get_gate_status(now);
        let failing = gates.iter().filter(|g| g.status == GateState::Fail).count();
        let unknown = gates.iter().filter(|g| g.status == GateState::Unknown).count();
        let passing = gates.len() - failing - unknown;

        let overall = if failing > 0 {
            GateState::Fail
        } else if unknown > 0 {
            GateState::Unknown
        } else {
            GateState::Pass
        };

        (overall, format!("{passing} gates passing, {failing} failing, {unknown} unknown"))
    }

    /// Clear all four histories. Exposed for test isolation between runs.
    pub fn reset_metrics(&self) {
        self.rubric_pass.lock().expect("rubric_pass mutex poisoned").clear();
        self.reproducibility.lock().expect("reproducibility mutex poisoned").clear();
        self.policy_high_severity.lock().expect("policy mutex poisoned").clear();
        self.latency.lock().expect("latency mutex poisoned").clear();
    }
}

fn insufficient_data(name: &str, have: usize, now: DateTime<Utc>) -> GateStatus {
    GateStatus {
        name: name.to_string(),
        status: GateState::Unknown,
        current_value: 0.0,
        target_value: 0.0,
        message: format!("Insufficient data ({have} samples, need {MIN_SAMPLES})"),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn gate_reports_unknown_below_minimum_samples() {
        let metrics = QualityGateMetrics::new();
        metrics.record_rubric_result("pop", true, now());
        let status = metrics.get_gate_status(now());
        assert_eq!(status[0].status, GateState::Unknown);
    }

    #[test]
    fn gate_a_passes_when_pass_rate_meets_target() {
        let metrics = QualityGateMetrics::new();
        for _ in 0..20 {
            metrics.record_rubric_result("pop", true, now());
        }
        let status = metrics.get_gate_status(now());
        assert_eq!(status[0].status, GateState::Pass);
    }

    #[test]
    fn gate_c_fails_on_any_high_severity_violation() {
        let metrics = QualityGateMetrics::new();
        for _ in 0..10 {
            metrics.record_policy_violation(0, 0, now());
        }
        metrics.record_policy_violation(1, 0, now());
        let status = metrics.get_gate_status(now());
        assert_eq!(status[2].status, GateState::Fail);
    }

    #[test]
    fn gate_d_uses_nearest_rank_p95_pooled_across_phases() {
        let metrics = QualityGateMetrics::new();
        for i in 0..20 {
            metrics.record_latency("generate", (i * 100) as f64, now());
        }
        let status = metrics.get_gate_status(now());
        assert!(status[3].current_value > 0.0);
    }

    #[test]
    fn reset_metrics_clears_all_histories() {
        let metrics = QualityGateMetrics::new();
        for _ in 0..20 {
            metrics.record_rubric_result("pop", true, now());
        }
        metrics.reset_metrics();
        let status = metrics.get_gate_status(now());
        assert_eq!(status[0].status, GateState::Unknown);
    }

    #[test]
    fn summary_counts_gates_by_status() {
        let metrics = QualityGateMetrics::new();
        let (_, summary) = metrics.get_metrics_summary(now());
        assert!(summary.contains("unknown"));
    }
}
