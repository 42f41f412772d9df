// src/cli/handlers/check.rs

use crate::cli::args::CheckArgs;
use crate::cli::handlers::commons;
use crate::core::diagnostics::{Diagnostic, Severity};
use anyhow::{Result, bail};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

/// Prints every diagnostic across the workspace. Exits with a failure when
/// any error-severity diagnostic exists; warnings alone pass.
pub fn handle(args: &CheckArgs, root: Option<&Path>) -> Result<()> {
    let (index, _) = commons::load_index(root)?;
    let snapshot = index.snapshot();

    let mut reports = Vec::new();
    for entry in snapshot.files() {
        let Some(diagnostics) = index.diagnostics(&entry.path) else {
            continue;
        };
        if !diagnostics.is_empty() {
            reports.push(FileReport {
                path: entry.path.clone(),
                diagnostics,
            });
        }
    }

    let errors = count(&reports, Severity::Error);
    let warnings = count(&reports, Severity::Warning);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.path.display().to_string().bold());
            for diag in &report.diagnostics {
                let severity = match diag.severity {
                    Severity::Error => "error".red().bold(),
                    Severity::Warning => "warning".yellow().bold(),
                };
                println!(
                    "  {}:{} {} [{}] {}",
                    diag.line,
                    diag.column,
                    severity,
                    diag.code.dimmed(),
                    diag.message
                );
            }
        }
        if reports.is_empty() {
            println!("{} no problems found", "ok:".green().bold());
        } else {
            println!("{} error(s), {} warning(s)", errors, warnings);
        }
    }

    if errors > 0 {
        bail!("workspace has {} error(s)", errors);
    }
    Ok(())
}

fn count(reports: &[FileReport], severity: Severity) -> usize {
    reports
        .iter()
        .flat_map(|r| &r.diagnostics)
        .filter(|d| d.severity == severity)
        .count()
}
