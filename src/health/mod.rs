//! Health & metrics subsystem (spec §4.10): one sample per iteration, a
//! composite [0,100] score, and threshold-crossing alerts. Consecutive
//! iteration failures flip a simple `healthy`/`unhealthy` flag independent of
//! the composite score.

pub mod alerts;
pub mod metrics;

use chrono::{DateTime, Utc};

use crate::error::LoomError;
use crate::models::{HealthMetricsHistory, HealthSample};
use crate::store::StateStore;

pub const RETENTION: std::time::Duration = std::time::Duration::from_secs(24 * 3600);
pub const CONSECUTIVE_FAILURES_UNHEALTHY: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStatus {
    Success,
    Failure,
    Timeout,
}

/// Rolling iteration-duration metrics (spec §4.10's "ring buffer of the last
/// 100 durations"), kept separate from `HealthMetricsHistory` since it's
/// timing-only and doesn't need age-based pruning.
#[derive(Debug, Clone, Default)]
pub struct IterationMetrics {
    durations: std::collections::VecDeque<f64>,
    pub consecutive_failures: u32,
    pub healthy: bool,
}

const DURATION_WINDOW: usize = 100;

impl IterationMetrics {
    pub fn new() -> Self {
        Self { durations: Default::default(), consecutive_failures: 0, healthy: true }
    }

    pub fn average_iteration_seconds(&self) -> f64 {
        if self.durations.is_empty() {
            0.0
        } else {
            self.durations.iter().sum::<f64>() / self.durations.len() as f64
        }
    }

    /// True when `duration` exceeds `slow_multiplier` times the rolling average
    /// (spec §4.8's slow-iteration detection). Always false until the window
    /// has at least one prior sample.
    pub fn is_slow(&self, duration_seconds: f64, slow_multiplier: f64) -> bool {
        let avg = self.average_iteration_seconds();
        avg > 0.0 && duration_seconds > avg * slow_multiplier
    }

    pub fn record(&mut self, status: IterationStatus, duration_seconds: f64) {
        self.durations.push_back(duration_seconds);
        if self.durations.len() > DURATION_WINDOW {
            self.durations.pop_front();
        }
        match status {
            IterationStatus::Success => {
                self.consecutive_failures = 0;
                self.healthy = true;
            }
            IterationStatus::Failure | IterationStatus::Timeout => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= CONSECUTIVE_FAILURES_UNHEALTHY {
                    self.healthy = false;
                }
            }
        }
    }
}

/// Raw figures the scheduler has on hand at the end of an iteration; this
/// module turns them into a scored, alert-annotated sample.
pub struct SampleInputs {
    pub issues_per_hour: f64,
    pub prs_per_hour: f64,
    pub queue_depth: usize,
    pub error_rate: f64,
    pub stuck_agents: usize,
    pub max_shepherds: usize,
    pub resource_usage_percent: f64,
}

/// Builds this iteration's sample, scores it against the prior sample in
/// `history`, generates any threshold-crossing alerts, appends both to
/// `history`, prunes by retention age, and persists via the store.
pub fn record_sample(
    store: &StateStore,
    inputs: SampleInputs,
    now: DateTime<Utc>,
) -> Result<HealthSample, LoomError> {
    let mut history = store.read_health().unwrap_or_default();
    let previous = history.samples.last().cloned();

    let score_inputs = metrics::ScoreInputs {
        error_rate: inputs.error_rate,
        stuck_agents: inputs.stuck_agents,
        max_shepherds: inputs.max_shepherds,
        queue_depth: inputs.queue_depth,
        queue_depth_prev: previous.as_ref().map(|p| p.queue_depth).unwrap_or(inputs.queue_depth),
        resource_usage_percent: inputs.resource_usage_percent,
        throughput_per_hour: inputs.issues_per_hour + inputs.prs_per_hour,
        throughput_per_hour_prev: previous
            .as_ref()
            .map(|p| p.issues_per_hour + p.prs_per_hour)
            .unwrap_or(inputs.issues_per_hour + inputs.prs_per_hour),
    };
    let score = metrics::composite_score(&score_inputs, &metrics::ScoreThresholds::default());

    let sample = HealthSample {
        timestamp: now,
        issues_per_hour: inputs.issues_per_hour,
        prs_per_hour: inputs.prs_per_hour,
        queue_depth: inputs.queue_depth,
        error_rate: inputs.error_rate,
        stuck_agents: inputs.stuck_agents,
        score,
    };

    let new_alerts = alerts::generate_alerts(
        &sample,
        previous.map(|p| p.queue_depth),
        inputs.resource_usage_percent,
        &alerts::AlertThresholds::default(),
        now,
    );
    for alert in new_alerts {
        history.push_alert(alert);
    }

    history.push_sample(sample.clone(), RETENTION, now);
    store.write_metrics_rotated(&history, now)?;
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_flips_to_unhealthy_after_three_failures() {
        let mut m = IterationMetrics::new();
        assert!(m.healthy);
        m.record(IterationStatus::Failure, 1.0);
        m.record(IterationStatus::Failure, 1.0);
        assert!(m.healthy);
        m.record(IterationStatus::Failure, 1.0);
        assert!(!m.healthy);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut m = IterationMetrics::new();
        m.record(IterationStatus::Failure, 1.0);
        m.record(IterationStatus::Failure, 1.0);
        m.record(IterationStatus::Success, 1.0);
        assert_eq!(m.consecutive_failures, 0);
        assert!(m.healthy);
    }

    #[test]
    fn duration_window_caps_at_100_samples() {
        let mut m = IterationMetrics::new();
        for _ in 0..150 {
            m.record(IterationStatus::Success, 10.0);
        }
        assert_eq!(m.durations.len(), DURATION_WINDOW);
    }

    #[test]
    fn slow_iteration_detected_above_multiplier() {
        let mut m = IterationMetrics::new();
        for _ in 0..5 {
            m.record(IterationStatus::Success, 10.0);
        }
        assert!(m.is_slow(25.0, 2.0));
        assert!(!m.is_slow(15.0, 2.0));
    }
}
