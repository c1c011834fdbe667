//! Sluice CLI - apply versioned migrations with a changelog and revision ledger

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, GlobalArgs};
use commands::common::ExitCode;
use commands::{apply, history, init, revisions};

fn init_logging(global: &GlobalArgs) {
    let default_filter = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let result = match &cli.command {
        cli::Commands::Init(args) => init::execute(args, &cli.global).await,
        cli::Commands::Apply(args) => apply::execute(args, &cli.global).await,
        cli::Commands::History(args) => history::execute(args, &cli.global).await,
        cli::Commands::Revisions(args) => revisions::execute(args, &cli.global).await,
    };

    match result {
        Err(e) => match e.downcast_ref::<ExitCode>() {
            Some(ExitCode(code)) => std::process::exit(*code),
            None => Err(e),
        },
        ok => ok,
    }
}
