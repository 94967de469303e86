//! Interrupt probe: a long-running experiment that reports how it ended.
//!
//! Cancellation has a single path. The binary turns SIGINT into a `true` on
//! a watch channel and the tick loop observes it between ticks, so exactly
//! one diagnostic is printed whatever the timing.

use std::{io::Write, time::Duration};

use runexp_config::ProbeConfig;
use tokio::sync::watch;

/// Signal number reported in the interrupt diagnostic.
const SIGINT: i32 = 2;

/// How the probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Every tick elapsed.
    Completed,
    /// Cancelled after `elapsed` whole ticks.
    Interrupted { elapsed: u64 },
}

/// Run the probe with one-second ticks, writing its report to `out`.
pub async fn run_probe<W: Write>(
    config: &ProbeConfig,
    cancel: watch::Receiver<bool>,
    out: &mut W,
) -> Result<ProbeOutcome, ProbeError> {
    run_with_tick(config, cancel, out, Duration::from_secs(1)).await
}

async fn run_with_tick<W: Write>(
    config: &ProbeConfig,
    mut cancel: watch::Receiver<bool>,
    out: &mut W,
    tick: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    writeln!(
        out,
        "Starting experiment with GPU={}, BATCH={}",
        label(config.gpu.as_deref(), "unknown"),
        label(config.batch.as_deref(), "unknown"),
    )?;
    writeln!(
        out,
        "Sleeping for {} seconds (press Ctrl-C to interrupt)...",
        config.seconds
    )?;
    out.flush()?;

    let every = config.progress_every.max(1);
    for i in 0..config.seconds {
        tokio::select! {
            () = tokio::time::sleep(tick) => {}
            () = cancelled(&mut cancel) => {
                tracing::debug!("probe cancelled after {i} ticks");
                writeln!(out)?;
                writeln!(out, "Received signal {SIGINT} in child process!")?;
                writeln!(
                    out,
                    "GPU={}, BATCH={}",
                    label(config.gpu.as_deref(), "N/A"),
                    label(config.batch.as_deref(), "N/A"),
                )?;
                out.flush()?;
                return Ok(ProbeOutcome::Interrupted { elapsed: i });
            }
        }
        if i % every == 0 {
            writeln!(out, "Still running... {i}s elapsed")?;
            out.flush()?;
        }
    }

    writeln!(out, "Completed successfully!")?;
    writeln!(out, "accuracy: 0.95")?;
    out.flush()?;
    Ok(ProbeOutcome::Completed)
}

/// Resolves once `true` is sent. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn label<'a>(value: Option<&'a str>, unset: &'a str) -> &'a str {
    value.unwrap_or(unset)
}

/// Errors that can occur while running the probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    fn config(gpu: Option<&str>, batch: Option<&str>, seconds: u64) -> ProbeConfig {
        ProbeConfig {
            gpu: gpu.map(str::to_string),
            batch: batch.map(str::to_string),
            seconds,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_completes() {
        let (_tx, rx) = watch::channel(false);
        let mut out = Vec::new();
        let outcome = run_with_tick(&config(Some("2"), Some("64"), 11), rx, &mut out, TICK)
            .await
            .unwrap();

        assert_eq!(outcome, ProbeOutcome::Completed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Starting experiment with GPU=2, BATCH=64\n\
             Sleeping for 11 seconds (press Ctrl-C to interrupt)...\n\
             Still running... 0s elapsed\n\
             Still running... 5s elapsed\n\
             Still running... 10s elapsed\n\
             Completed successfully!\n\
             accuracy: 0.95\n"
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut out = Vec::new();
        let outcome = run_with_tick(&config(None, None, 2), rx, &mut out, TICK)
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::Completed);
        assert!(String::from_utf8(out).unwrap().starts_with(
            "Starting experiment with GPU=unknown, BATCH=unknown\n"
        ));
    }

    #[tokio::test]
    async fn test_interrupt_prints_one_diagnostic() {
        let (tx, rx) = watch::channel(false);
        let mut out = Vec::new();
        let probe = config(Some("4"), None, 1000);

        let (outcome, ()) = tokio::join!(
            run_with_tick(&probe, rx, &mut out, TICK),
            async {
                tokio::time::sleep(TICK * 3).await;
                tx.send(true).unwrap();
                // Repeated interrupts are observed once
                let _ = tx.send(true);
            }
        );

        assert!(matches!(outcome.unwrap(), ProbeOutcome::Interrupted { .. }));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Received signal 2 in child process!").count(), 1);
        assert!(text.ends_with("GPU=4, BATCH=N/A\n"));
        assert!(!text.contains("Completed successfully!"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (_tx, rx) = watch::channel(true);
        let mut out = Vec::new();
        let outcome = run_with_tick(&config(None, None, 5), rx, &mut out, TICK)
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::Interrupted { elapsed: 0 });
    }
}
