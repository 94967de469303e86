//! runexp CLI
//!
//! Expands the sweep parameters, runs the command once per combination and
//! records the scraped metrics in a CSV file.

use std::process::ExitCode;

use clap::{CommandFactory, error::ErrorKind};
use runexp::{
    HarnessArgs, Layout, Outcome, ResultStore, Runner, Scheduler,
    args::{self, ArgsError},
    config, sweep,
};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status after SIGINT, as a shell would report it.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // tracing needs to be initialized with indicatif_layer to not clobber progress bars
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with(indicatif_layer)
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help or -h for usage information");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        HarnessArgs::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let invocation = match args::split_args(&argv) {
        Ok(invocation) => invocation,
        Err(ArgsError::Clap(e)) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            _ => {
                // clap renders its own "error:" line and usage
                e.print()?;
                eprintln!("Use --help or -h for usage information");
                return Ok(ExitCode::FAILURE);
            }
        },
        Err(e) => return Err(e.into()),
    };

    let settings = config::resolve(
        invocation.args.config.as_deref(),
        invocation.args.overrides(),
    )?;
    let combinations = sweep::expand(&invocation.params)?;
    println!("Generated {} parameter combinations", combinations.len());

    if invocation.args.dry_run {
        for (idx, combo) in combinations.iter().enumerate() {
            println!("{:>4}: {combo}", idx + 1);
        }
        if invocation.command.is_empty() {
            println!("Command: <script from stdin>");
        } else {
            println!("Command: {}", invocation.command.join(" "));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let command = if invocation.command.is_empty() {
        args::read_script(std::io::stdin().lock())?
    } else {
        invocation.command.clone()
    };

    tracing::info!(
        "Sweep of {} combinations, concurrency {}, scraping {}, writing {}",
        combinations.len(),
        settings.concurrency,
        settings.stream,
        settings.output
    );

    let runner = Runner::new(command, &settings)?;
    let store = ResultStore::new(
        &settings.output,
        Layout::new(invocation.param_names(), &settings),
    );
    let scheduler = Scheduler::new(runner, store, settings.concurrency);

    match scheduler.run(&combinations).await? {
        Outcome::Finished(summary) => {
            println!(
                "Completed {} out of {} combinations",
                summary.recorded, summary.total
            );
            if summary.failed > 0 {
                println!("Failed: {}", summary.failed);
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Interrupted(summary) => {
            println!(
                "Interrupted: {} out of {} combinations recorded",
                summary.recorded, summary.total
            );
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}
