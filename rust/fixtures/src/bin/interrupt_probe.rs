//! Sleep for a while, reporting how the run ended. Used to check that a
//! sweep forwards Ctrl-C to its experiments.

use std::process::ExitCode;

use clap::Parser;
use runexp_config::ProbeConfig;
use runexp_fixtures::{
    EXIT_INTERRUPTED, init_tracing,
    probe::{self, ProbeOutcome},
};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::watch,
};

#[derive(Parser)]
#[command(
    name = "interrupt-probe",
    about = "Sleep, then print a metric; report SIGINT and exit 130"
)]
struct Cli {
    #[command(flatten)]
    config: ProbeConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    // Registered before the first line is printed so no SIGINT is lost
    let mut interrupts = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to install interrupt handler: {e}");
            return ExitCode::FAILURE;
        }
    };
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if interrupts.recv().await.is_some() {
            let _ = cancel_tx.send(true);
        }
    });

    let mut stdout = std::io::stdout();
    match probe::run_probe(&cli.config, cancel_rx, &mut stdout).await {
        Ok(ProbeOutcome::Completed) => ExitCode::SUCCESS,
        Ok(ProbeOutcome::Interrupted { elapsed }) => {
            tracing::info!("interrupted after {elapsed}s");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
