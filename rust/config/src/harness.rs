//! Sweep settings for the `runexp` harness.

use serde::{Deserialize, Serialize};

/// Which child output streams are scraped for metrics and preserved.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    #[default]
    Both,
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Names of the preserved-output columns, in file order.
    #[must_use]
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Both => &["stdout", "stderr"],
            Self::Stdout => &["stdout"],
            Self::Stderr => &["stderr"],
        }
    }
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Both => write!(f, "both"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Resolved settings of one sweep.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessSettings {
    /// Result CSV path.
    #[serde(default = "default_output")]
    pub output: String,
    /// Maximum number of experiments running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Metric filter. Empty keeps every label but writes no metric columns.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Add the raw output columns to the result file.
    #[serde(default)]
    pub preserve_output: bool,
    /// Streams to scrape.
    #[serde(default)]
    pub stream: OutputStream,
    /// Kill an experiment that runs longer than this.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_output() -> String {
    "results.csv".into()
}
fn default_concurrency() -> usize {
    1
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
            metrics: Vec::new(),
            preserve_output: false,
            stream: OutputStream::default(),
            timeout_secs: None,
        }
    }
}
