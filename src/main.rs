//! Clbridge CLI entry point.

use clap::Parser;
use clbridge::cli::{self, Cli, Commands, EXIT_ERROR};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Analyze(args) => match cli::run_analyze(&args) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_ERROR
            }
        },
        Commands::Init(args) => match cli::run_init(&args) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_ERROR
            }
        },
    };

    std::process::exit(exit_code);
}
