mod cli;
mod commands;
mod config;
mod engine;
mod host;
mod paths;
mod prompt;
mod runner;
mod steps;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Config file given on the command line or in the environment
    pub config: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        None | Some(Command::Menu) => commands::menu::run(&ctx),
        Some(Command::Run(args)) => commands::run::run(&ctx, args),
        Some(Command::Plan(args)) => commands::plan::run(&ctx, args),
        Some(Command::Check) => commands::check::run(&ctx),
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "benchforge", &mut io::stdout());
            Ok(())
        }
    }
}
