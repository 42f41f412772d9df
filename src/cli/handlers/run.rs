// src/cli/handlers/run.rs

use crate::cli::args::RunArgs;
use crate::cli::handlers::commons;
use crate::core::engine;
use crate::core::logctx::LogContext;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

pub fn handle(args: &RunArgs, root: Option<&Path>, ctx: &LogContext) -> Result<()> {
    let (index, _) = commons::load_index(root)?;
    let overrides = commons::parse_overrides(&args.set)?;

    let snapshot = index.snapshot();
    let plan = engine::plan(&snapshot, Some(&args.task), &overrides)
        .with_context(|| format!("failed to plan task '{}'", args.task))?;

    if args.dry_run {
        for (i, stage) in plan.stages.iter().enumerate() {
            println!("{}", format!("stage {}", i + 1).bold());
            for task in stage {
                println!("  {}  {}", task.qualified_name.cyan(), task.command);
            }
        }
        return Ok(());
    }

    engine::run(&plan, ctx)?;
    ctx.info(&format!(
        "{} {} task(s) completed",
        "ok:".green().bold(),
        plan.task_count()
    ));
    Ok(())
}
