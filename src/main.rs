mod api;
mod cli;
mod commands;
mod config;
mod output;
mod progress;
mod retry;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{ApplyTarget, Cli, Command, DiffTarget};
use commands::Target;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub api_url: Option<String>,
    pub output_dir: Option<PathBuf>,
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
        verbose: cli.verbose,
        quiet: cli.quiet,
        api_url: cli.api_url,
        output_dir: cli.output_dir,
    };
    log::trace!("Running with verbosity {}", ctx.verbose);

    match cli.command {
        Command::Diff(target) => match target {
            DiffTarget::Cluster(args) => commands::diff::run(&ctx, Target::Cluster, args),
            DiffTarget::Application(args) => commands::diff::run(&ctx, Target::Application, args),
        },
        Command::Apply(target) => match target {
            ApplyTarget::Cluster(args) => commands::apply::run(&ctx, Target::Cluster, args),
            ApplyTarget::Application(args) => {
                commands::apply::run(&ctx, Target::Application, args)
            }
        },
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "keel", &mut io::stdout());
            Ok(())
        }
    }
}
