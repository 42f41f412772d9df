// src/cli/args.rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tasktree",
    version,
    about = "Declarative task orchestration over *.tasks.toml manifests."
)]
pub struct Cli {
    /// Workspace root to search for manifests. Defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a task after running all of its dependencies.
    Run(RunArgs),
    /// List every task defined in the workspace.
    List,
    /// Print all diagnostics across the workspace.
    Check(CheckArgs),
    /// Display tasks and their dependencies as a tree.
    Tree(TreeArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// The task to run: a short name or a qualified `file::task` name.
    pub task: String,

    /// Override a variable, `KEY=VALUE`. Repeatable; beats every declared scope.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Print the expanded commands in execution order without spawning anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Emit diagnostics as JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct TreeArgs {
    /// Show only this task's subtree. Defaults to every top-level task.
    pub task: Option<String>,
}
