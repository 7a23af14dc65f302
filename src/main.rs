use clap::Parser;
use cxxboot::cli::Cli;
use cxxboot::{commands, error, ui};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse first so --verbose can raise the log level
    let cli = Cli::parse();

    let env_filter = if cli.global.verbose {
        EnvFilter::new("cxxboot=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cxxboot=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = commands::execute(cli) {
        ui::error(format!("{err:#}"));
        std::process::exit(error::exit_code(&err));
    }
}
