// src/bin/tasktree.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::Level;
use tasktree::cli::{Cli, Command, handlers};
use tasktree::core::logctx::LogContext;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let level = match cli.verbose {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    };
    let ctx = LogContext::stderr(level);
    let root = cli.root.as_deref();

    match &cli.command {
        Command::Run(args) => handlers::run::handle(args, root, &ctx),
        Command::List => handlers::list::handle(root),
        Command::Check(args) => handlers::check::handle(args, root),
        Command::Tree(args) => handlers::tree::handle(args, root),
    }
}
