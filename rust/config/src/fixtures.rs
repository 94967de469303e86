//! Configuration for the fixture processes a sweep is tested against.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Inputs of the training stand-in.
///
/// Both values are validated to be at least 1, so `batch_size / gpu` is
/// always defined.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct TrainStandIn {
    /// Number of GPUs the fake job pretends to use.
    #[serde(default = "default_gpu")]
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "GPU", default_value = "1", value_parser = clap::value_parser!(u32).range(1..))
    )]
    pub gpu: u32,
    /// Batch size the fake job pretends to use.
    #[serde(default = "default_batch_size")]
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "BATCHSIZE", default_value = "32", value_parser = clap::value_parser!(u32).range(1..))
    )]
    pub batch_size: u32,
}

fn default_gpu() -> u32 {
    1
}
fn default_batch_size() -> u32 {
    32
}

impl Default for TrainStandIn {
    fn default() -> Self {
        Self {
            gpu: default_gpu(),
            batch_size: default_batch_size(),
        }
    }
}

impl TrainStandIn {
    /// Seed for the metric generator. Equal inputs give equal output.
    #[must_use]
    pub fn seed(&self) -> u64 {
        u64::from(self.gpu) * u64::from(self.batch_size)
    }
}

/// Inputs of the interrupt probe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ProbeConfig {
    /// GPU label echoed in the diagnostics. Free-form.
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long, env = "GPU"))]
    pub gpu: Option<String>,
    /// Batch label echoed in the diagnostics. Free-form.
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long, env = "BATCH"))]
    pub batch: Option<String>,
    /// How many one-second ticks to sleep before completing.
    #[serde(default = "default_seconds")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "30"))]
    pub seconds: u64,
    /// Print a progress line every this many ticks.
    #[serde(default = "default_progress_every")]
    #[cfg_attr(
        feature = "clap",
        arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..), hide = true)
    )]
    pub progress_every: u64,
}

fn default_seconds() -> u64 {
    30
}
fn default_progress_every() -> u64 {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            gpu: None,
            batch: None,
            seconds: default_seconds(),
            progress_every: default_progress_every(),
        }
    }
}

/// Inputs of the CSV inspector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct InspectConfig {
    /// CSV file to inspect.
    #[serde(default = "default_inspect_path")]
    #[cfg_attr(feature = "clap", arg(default_value = "test_concurrent_fail.csv"))]
    pub path: PathBuf,
}

fn default_inspect_path() -> PathBuf {
    PathBuf::from("test_concurrent_fail.csv")
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            path: default_inspect_path(),
        }
    }
}
