//! Threshold evaluation
//!
//! A metric is in warning when its value is strictly greater than the
//! threshold. There is no grace period and no hysteresis: every sample above
//! the threshold produces a fresh alert.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Metric, Sample};

/// A metric exceeded the warning threshold at `timestamp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub metric: Metric,
    pub value: f64,
    #[serde(with = "crate::util::timestamp_format")]
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvaluation {
    Ok,
    Exceeding,
}

impl ResourceEvaluation {
    pub fn evaluate(value: f64, threshold: f64) -> ResourceEvaluation {
        // equality is not a warning
        if value > threshold {
            ResourceEvaluation::Exceeding
        } else {
            ResourceEvaluation::Ok
        }
    }
}

/// All alerts raised by `sample`, in cpu, ram, disk order.
pub fn evaluate(sample: &Sample, warning_threshold_percent: f64) -> Vec<AlertEvent> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let value = sample.value(metric);
            let evaluation = ResourceEvaluation::evaluate(value, warning_threshold_percent);

            trace!("{metric}: {value} (max: {warning_threshold_percent}) -> {evaluation:?}");

            (evaluation == ResourceEvaluation::Exceeding).then(|| AlertEvent {
                metric,
                value,
                timestamp: sample.timestamp,
            })
        })
        .collect()
}
