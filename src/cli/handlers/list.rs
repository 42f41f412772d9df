// src/cli/handlers/list.rs

use crate::cli::handlers::commons;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn handle(root: Option<&Path>) -> Result<()> {
    let (index, _) = commons::load_index(root)?;
    let tasks = index.all_tasks();
    if tasks.is_empty() {
        println!("No tasks defined in this workspace.");
        return Ok(());
    }

    let width = tasks
        .iter()
        .map(|t| t.qualified_name.len())
        .max()
        .unwrap_or(0);
    for task in tasks {
        match &task.desc {
            Some(desc) => println!(
                "{:width$}  {}",
                task.qualified_name.cyan(),
                desc.dimmed(),
                width = width
            ),
            None => println!("{}", task.qualified_name.cyan()),
        }
    }
    Ok(())
}
