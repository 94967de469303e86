#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

//! runexp: run a command for every combination of parameter values.
//!
//! Parameters become environment variables of the child, numeric metrics
//! are scraped from its output, and every finished combination is written
//! as one CSV row so an interrupted sweep can be resumed.

pub mod args;
pub mod config;
pub mod output;
pub mod results;
pub mod runner;
pub mod scheduler;
pub mod sweep;

pub use args::{HarnessArgs, Invocation};
pub use output::Metrics;
pub use results::{Layout, ResultStore};
pub use runner::Runner;
pub use scheduler::{Outcome, Scheduler, SweepSummary};
pub use sweep::Combination;
