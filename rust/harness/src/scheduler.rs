//! Sweep scheduling: bounded parallelism, resume and interrupt handling.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::{
    signal::unix::{SignalKind, signal},
    task::JoinSet,
};

use crate::{
    results::{ResultRow, ResultStore, ResultsError},
    runner::{RunError, Runner, signal_group},
    sweep::Combination,
};

/// Runs every combination of a sweep, recording results as they finish.
pub struct Scheduler {
    runner: Arc<Runner>,
    store: ResultStore,
    concurrency: usize,
}

/// Counters of a finished or interrupted sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Number of combinations in the sweep.
    pub total: usize,
    /// Rows in the result file (carried over plus newly recorded).
    pub recorded: usize,
    /// Combinations carried over from an earlier run.
    pub skipped: usize,
    /// Combinations that failed.
    pub failed: usize,
    /// Combinations stopped by an interrupt.
    pub interrupted: usize,
}

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every combination was attempted.
    Finished(SweepSummary),
    /// SIGINT stopped the sweep early.
    Interrupted(SweepSummary),
}

impl Outcome {
    #[must_use]
    pub fn summary(&self) -> &SweepSummary {
        match self {
            Self::Finished(s) | Self::Interrupted(s) => s,
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(runner: Runner, store: ResultStore, concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the sweep until every combination has been attempted or SIGINT
    /// arrives.
    ///
    /// On the first SIGINT no new experiments start and every running
    /// experiment's process group receives SIGINT once; a second SIGINT
    /// escalates to SIGKILL. Successful results are saved either way.
    pub async fn run(&self, combinations: &[Combination]) -> Result<Outcome, SchedulerError> {
        // Register before spawning anything so no SIGINT is lost.
        let mut interrupts = signal(SignalKind::interrupt()).map_err(SchedulerError::Signal)?;

        let total = combinations.len();
        let existing = self.store.load()?;
        let mut slots: Vec<Option<ResultRow>> = vec![None; total];
        let mut pending = VecDeque::new();
        let mut summary = SweepSummary {
            total,
            ..Default::default()
        };

        for (idx, combo) in combinations.iter().enumerate() {
            if let Some(row) = existing.iter().find(|r| r.combination == *combo) {
                println!("Skipping combination {}/{} (already exists)", idx + 1, total);
                slots[idx] = Some(row.clone());
                summary.skipped += 1;
            } else {
                pending.push_back(idx);
            }
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#*-"),
        );
        pb.set_position(summary.skipped as u64);

        // idx -> PID of every running experiment
        let mut running: HashMap<usize, u32> = HashMap::new();
        let mut tasks = JoinSet::new();
        let mut interrupt_count = 0u32;

        loop {
            while interrupt_count == 0 && running.len() < self.concurrency {
                let Some(idx) = pending.pop_front() else {
                    break;
                };
                let combo = &combinations[idx];
                pb.suspend(|| println!("Running combination {}/{}", idx + 1, total));

                match self.runner.spawn(combo) {
                    Ok(handle) => {
                        tracing::info!("Started {}/{} [{combo}] (PID {})", idx + 1, total, handle.pid);
                        running.insert(idx, handle.pid);
                        let runner = Arc::clone(&self.runner);
                        tasks.spawn(async move { (idx, runner.wait(handle).await) });
                    }
                    Err(e) => {
                        pb.suspend(|| report_failure(idx, total, combo, &e));
                        summary.failed += 1;
                        pb.inc(1);
                    }
                }
            }
            pb.set_message(format!("{} running", running.len()));

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = interrupts.recv() => {
                    interrupt_count += 1;
                    let sig = if interrupt_count == 1 { libc::SIGINT } else { libc::SIGKILL };
                    tracing::warn!(
                        "Interrupt received, signalling {} running experiment(s) with {}",
                        running.len(),
                        if sig == libc::SIGINT { "SIGINT" } else { "SIGKILL" },
                    );
                    for pid in running.values() {
                        signal_group(*pid, sig);
                    }
                }
                Some(joined) = tasks.join_next() => {
                    let (idx, result) = joined?;
                    running.remove(&idx);
                    pb.inc(1);
                    let combo = &combinations[idx];
                    match result {
                        Ok(output) => {
                            tracing::info!("Finished {}/{} [{combo}]", idx + 1, total);
                            slots[idx] = Some(ResultRow::from_output(
                                combo.clone(),
                                &output,
                                self.store.layout(),
                            ));
                            self.save(&slots)?;
                        }
                        Err(e) if interrupt_count > 0 => {
                            tracing::info!("Combination {}/{} interrupted: {e}", idx + 1, total);
                            summary.interrupted += 1;
                        }
                        Err(e) => {
                            pb.suspend(|| report_failure(idx, total, combo, &e));
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        // A SIGINT delivered alongside the last completion still counts
        if interrupt_count == 0 {
            tokio::select! {
                biased;
                Some(()) = interrupts.recv() => interrupt_count += 1,
                () = std::future::ready(()) => {}
            }
        }

        pb.finish_and_clear();
        self.save(&slots)?;
        summary.recorded = slots.iter().flatten().count();

        if interrupt_count > 0 {
            summary.interrupted += pending.len();
            Ok(Outcome::Interrupted(summary))
        } else {
            Ok(Outcome::Finished(summary))
        }
    }

    fn save(&self, slots: &[Option<ResultRow>]) -> Result<(), ResultsError> {
        let rows: Vec<ResultRow> = slots.iter().flatten().cloned().collect();
        self.store.save(&rows)
    }
}

/// Echo a failed experiment's captured output so the user can inspect it.
fn report_failure(idx: usize, total: usize, combo: &Combination, err: &RunError) {
    if let Some((stdout, stderr)) = err.captured() {
        eprintln!("=== stdout ===");
        eprint!("{stdout}");
        eprintln!("=== stderr ===");
        eprint!("{stderr}");
    }
    tracing::error!("Failed to run combination {}/{} [{combo}]: {err}", idx + 1, total);
}

/// Errors that abort a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error("experiment task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to install interrupt handler: {0}")]
    Signal(std::io::Error),
}
