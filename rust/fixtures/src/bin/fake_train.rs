//! Training stand-in: prints deterministic metrics for GPU/BATCHSIZE.

use clap::Parser;
use runexp_config::TrainStandIn;
use runexp_fixtures::{init_tracing, train};

#[derive(Parser)]
#[command(
    name = "fake-train",
    about = "Print deterministic metrics derived from GPU and BATCHSIZE"
)]
struct Cli {
    #[command(flatten)]
    config: TrainStandIn,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    println!("{}", train::simulate(&cli.config));
}
