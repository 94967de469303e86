//! Deterministic metric generator standing in for a training job.

use std::fmt;

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use runexp_config::TrainStandIn;

/// Metrics of one simulated run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsReport {
    /// Percent, in `[0, 100]`, two decimals.
    pub accuracy: f64,
    /// In `[0, 2]`, four decimals.
    pub loss: f64,
    /// Seconds, in `[batch/gpu, batch/gpu + 10)`, truncated to two decimals.
    pub training_time: f64,
    pub gpu: u32,
    pub batch_size: u32,
}

/// Produce the metrics for `config`. Equal configs give equal reports.
#[must_use]
pub fn simulate(config: &TrainStandIn) -> MetricsReport {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed());
    let accuracy = round_to(rng.random::<f64>() * 100.0, 2);
    let loss = round_to(rng.random::<f64>() * 2.0, 4);
    let base = f64::from(config.batch_size) / f64::from(config.gpu);
    let training_time = truncate_to(base + rng.random::<f64>() * 10.0, 2);

    tracing::debug!(seed = config.seed(), "simulated run");

    MetricsReport {
        accuracy,
        loss,
        training_time,
        gpu: config.gpu,
        batch_size: config.batch_size,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// Rounding could reach the exclusive upper bound
fn truncate_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).trunc() / scale
}

// `Debug` keeps a trailing `.0` on whole values (`45.0`, not `45`)
impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "accuracy: {:?}", self.accuracy)?;
        writeln!(f, "loss: {:?}", self.loss)?;
        writeln!(f, "training time: {:?}", self.training_time)?;
        writeln!(f, "GPU count: {}", self.gpu)?;
        write!(f, "Batch size: {}", self.batch_size)
    }
}
