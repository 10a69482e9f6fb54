//! Alert generation on threshold crossings (spec §4.10). Pure function: given
//! the current and previous sample, returns the alerts that should fire this
//! iteration. The caller is responsible for appending them to history.

use chrono::{DateTime, Utc};

use crate::models::{Alert, AlertKind, AlertSeverity, HealthSample};

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub high_error_rate: f64,
    pub stuck_agents_warning: usize,
    pub stuck_agents_critical: usize,
    pub resource_exhaustion_percent: f64,
    pub queue_growth_fraction: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_error_rate: 0.25,
            stuck_agents_warning: 1,
            stuck_agents_critical: 3,
            resource_exhaustion_percent: 90.0,
            queue_growth_fraction: 0.5,
        }
    }
}

pub fn generate_alerts(
    sample: &HealthSample,
    previous_queue_depth: Option<usize>,
    resource_usage_percent: f64,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if sample.error_rate >= thresholds.high_error_rate {
        alerts.push(Alert {
            kind: AlertKind::HighErrorRate,
            severity: AlertSeverity::Warning,
            message: format!("error rate {:.0}% at or above threshold", sample.error_rate * 100.0),
            triggered_at: now,
        });
    }

    if sample.stuck_agents >= thresholds.stuck_agents_critical {
        alerts.push(Alert {
            kind: AlertKind::StuckAgents,
            severity: AlertSeverity::Critical,
            message: format!("{} shepherds stuck", sample.stuck_agents),
            triggered_at: now,
        });
    } else if sample.stuck_agents >= thresholds.stuck_agents_warning {
        alerts.push(Alert {
            kind: AlertKind::StuckAgents,
            severity: AlertSeverity::Warning,
            message: format!("{} shepherd(s) stuck", sample.stuck_agents),
            triggered_at: now,
        });
    }

    if resource_usage_percent >= thresholds.resource_exhaustion_percent {
        alerts.push(Alert {
            kind: AlertKind::ResourceExhaustion,
            severity: AlertSeverity::Critical,
            message: format!("resource usage at {resource_usage_percent:.0}%"),
            triggered_at: now,
        });
    }

    if let Some(prev) = previous_queue_depth {
        if prev > 0 {
            let growth = (sample.queue_depth as f64 - prev as f64) / prev as f64;
            if growth >= thresholds.queue_growth_fraction {
                alerts.push(Alert {
                    kind: AlertKind::QueueGrowth,
                    severity: AlertSeverity::Warning,
                    message: format!("queue depth grew {:.0}% ({prev} -> {})", growth * 100.0, sample.queue_depth),
                    triggered_at: now,
                });
            }
        }
    }

    alerts
}
