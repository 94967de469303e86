//! Print a summary of a result CSV.

use std::process::ExitCode;

use clap::Parser;
use runexp_config::InspectConfig;
use runexp_fixtures::{init_tracing, inspect};

#[derive(Parser)]
#[command(name = "check-csv", about = "Summarise the rows of a result CSV")]
struct Cli {
    #[command(flatten)]
    config: InspectConfig,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match inspect::inspect(&cli.config.path) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
