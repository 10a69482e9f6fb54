use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StuckAgents,
    HighErrorRate,
    ResourceExhaustion,
    QueueGrowth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

/// One rolling-window health sample (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub issues_per_hour: f64,
    pub prs_per_hour: f64,
    pub queue_depth: usize,
    pub error_rate: f64,
    pub stuck_agents: usize,
    pub score: u8,
}

/// Append-only history with age-based retention pruning (default 24h).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthMetricsHistory {
    pub samples: Vec<HealthSample>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

pub const ALERT_RETENTION: usize = 100;

impl HealthMetricsHistory {
    pub fn push_sample(&mut self, sample: HealthSample, retention: std::time::Duration, now: DateTime<Utc>) {
        self.samples.push(sample);
        self.samples.retain(|s| {
            (now - s.timestamp)
                .to_std()
                .map(|age| age <= retention)
                .unwrap_or(false)
        });
    }

    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
        if self.alerts.len() > ALERT_RETENTION {
            let excess = self.alerts.len() - ALERT_RETENTION;
            self.alerts.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn samples_outside_retention_window_are_pruned() {
        let mut history = HealthMetricsHistory::default();
        let now = Utc::now();
        history.push_sample(
            HealthSample {
                timestamp: now - chrono::Duration::hours(30),
                issues_per_hour: 0.0,
                prs_per_hour: 0.0,
                queue_depth: 0,
                error_rate: 0.0,
                stuck_agents: 0,
                score: 100,
            },
            Duration::from_secs(24 * 3600),
            now,
        );
        assert!(history.samples.is_empty());
    }

    #[test]
    fn alerts_capped_at_retention() {
        let mut history = HealthMetricsHistory::default();
        for _ in 0..(ALERT_RETENTION + 5) {
            history.push_alert(Alert {
                kind: AlertKind::StuckAgents,
                severity: AlertSeverity::Warning,
                message: "x".into(),
                triggered_at: Utc::now(),
            });
        }
        assert_eq!(history.alerts.len(), ALERT_RETENTION);
    }
}
