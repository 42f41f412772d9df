// src/core/graph_display.rs

use crate::core::graph::{TaskGraph, TaskNode};
use colored::Colorize;

/// Displays an ASCII tree of tasks and their dependencies. With a root, only
/// that task's subtree is shown; otherwise every task no other task depends
/// on becomes a top-level entry.
pub fn display_task_tree(graph: &TaskGraph, root: Option<&TaskNode>) {
    if graph.is_empty() {
        println!("No tasks defined in this workspace.");
        return;
    }

    match root {
        Some(node) => {
            print_root(node);
            print_children(node, graph, "");
        }
        None => {
            let mut depended_on = vec![false; graph.len()];
            for node in graph.nodes() {
                for &dep in &node.deps {
                    depended_on[dep] = true;
                }
            }
            for (i, node) in graph.nodes().iter().enumerate() {
                if !depended_on[i] {
                    print_root(node);
                    print_children(node, graph, "");
                }
            }
        }
    }
}

fn print_root(node: &TaskNode) {
    match &node.task.desc {
        Some(desc) => println!("{}  {}", node.task.qualified_name.bold(), desc.dimmed()),
        None => println!("{}", node.task.qualified_name.bold()),
    }
}

fn print_children(node: &TaskNode, graph: &TaskGraph, prefix: &str) {
    // `deps` is sorted by node index, which is qualified-name order.
    for (i, &dep) in node.deps.iter().enumerate() {
        let is_last = i == node.deps.len() - 1;
        let child = &graph.nodes()[dep];
        let connector = if is_last { "└─ " } else { "├─ " };
        println!("{}{}{}", prefix, connector, child.task.qualified_name);
        let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
        print_children(child, graph, &child_prefix);
    }
}
