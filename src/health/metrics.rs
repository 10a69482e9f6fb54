//! Composite health scoring (spec §4.10): a [0,100] score obtained by
//! deducting points across five factors. Thresholds are configurable via
//! environment so an operator can tune sensitivity without a rebuild.

/// Inputs to one health sample's score. All rates/fractions are already
/// normalized by the caller (e.g. `error_rate` is errors/iterations, not a count).
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub error_rate: f64,
    pub stuck_agents: usize,
    pub max_shepherds: usize,
    pub queue_depth: usize,
    pub queue_depth_prev: usize,
    pub resource_usage_percent: f64,
    pub throughput_per_hour: f64,
    pub throughput_per_hour_prev: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreThresholds {
    pub error_rate_weight: f64,
    pub stuck_agents_weight: f64,
    pub queue_growth_weight: f64,
    pub resource_usage_weight: f64,
    pub throughput_decline_weight: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            error_rate_weight: 40.0,
            stuck_agents_weight: 25.0,
            queue_growth_weight: 15.0,
            resource_usage_weight: 10.0,
            throughput_decline_weight: 10.0,
        }
    }
}

/// Deducts `weight * severity` for each factor, where severity is a fraction
/// in `[0, 1]` describing how bad that factor currently is, floored at 0.
pub fn composite_score(inputs: &ScoreInputs, thresholds: &ScoreThresholds) -> u8 {
    let mut score = 100.0_f64;

    score -= thresholds.error_rate_weight * inputs.error_rate.clamp(0.0, 1.0);

    let stuck_fraction = if inputs.max_shepherds == 0 {
        0.0
    } else {
        (inputs.stuck_agents as f64 / inputs.max_shepherds as f64).clamp(0.0, 1.0)
    };
    score -= thresholds.stuck_agents_weight * stuck_fraction;

    let growth = if inputs.queue_depth_prev == 0 {
        if inputs.queue_depth > 0 { 1.0 } else { 0.0 }
    } else {
        ((inputs.queue_depth as f64 - inputs.queue_depth_prev as f64) / inputs.queue_depth_prev as f64).clamp(0.0, 1.0)
    };
    score -= thresholds.queue_growth_weight * growth;

    score -= thresholds.resource_usage_weight * (inputs.resource_usage_percent / 100.0).clamp(0.0, 1.0);

    let decline = if inputs.throughput_per_hour_prev <= 0.0 {
        0.0
    } else {
        ((inputs.throughput_per_hour_prev - inputs.throughput_per_hour) / inputs.throughput_per_hour_prev).clamp(0.0, 1.0)
    };
    score -= thresholds.throughput_decline_weight * decline;

    score.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_inputs() -> ScoreInputs {
        ScoreInputs {
            error_rate: 0.0,
            stuck_agents: 0,
            max_shepherds: 3,
            queue_depth: 2,
            queue_depth_prev: 2,
            resource_usage_percent: 10.0,
            throughput_per_hour: 5.0,
            throughput_per_hour_prev: 5.0,
        }
    }

    #[test]
    fn fully_healthy_inputs_score_one_hundred() {
        assert_eq!(composite_score(&healthy_inputs(), &ScoreThresholds::default()), 100);
    }

    #[test]
    fn high_error_rate_drags_score_down() {
        let mut inputs = healthy_inputs();
        inputs.error_rate = 1.0;
        assert_eq!(composite_score(&inputs, &ScoreThresholds::default()), 60);
    }

    #[test]
    fn all_stuck_agents_deducts_full_weight() {
        let mut inputs = healthy_inputs();
        inputs.stuck_agents = 3;
        assert_eq!(composite_score(&inputs, &ScoreThresholds::default()), 75);
    }

    #[test]
    fn score_never_goes_below_zero() {
        let inputs = ScoreInputs {
            error_rate: 1.0,
            stuck_agents: 10,
            max_shepherds: 3,
            queue_depth: 100,
            queue_depth_prev: 1,
            resource_usage_percent: 100.0,
            throughput_per_hour: 0.0,
            throughput_per_hour_prev: 10.0,
        };
        assert_eq!(composite_score(&inputs, &ScoreThresholds::default()), 0);
    }
}
