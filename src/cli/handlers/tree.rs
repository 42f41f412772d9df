// src/cli/handlers/tree.rs

use crate::cli::args::TreeArgs;
use crate::cli::handlers::commons;
use crate::core::{engine, graph, graph_display};
use anyhow::{Context, Result};
use std::path::Path;

pub fn handle(args: &TreeArgs, root: Option<&Path>) -> Result<()> {
    let (index, _) = commons::load_index(root)?;
    let graph = graph::build_graph(index.all_tasks())
        .context("workspace graph is invalid; run `tasktree check` for details")?;

    let root_node = match &args.task {
        Some(name) => {
            let qualified = engine::resolve_root(&graph, name)?;
            graph.get(&qualified)
        }
        None => None,
    };
    graph_display::display_task_tree(&graph, root_node);
    Ok(())
}
