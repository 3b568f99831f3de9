//! `wte` command-line entry point.

use clap::Parser;
use wte_core::cli::{run, Cli};
use wte_core::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);
    std::process::exit(run(cli).as_i32());
}
