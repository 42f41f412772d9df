// src/core/engine.rs

//! Execution engine: turns a workspace snapshot into an execution plan and
//! runs it stage by stage.
//!
//! Planning happens entirely up front: every command is resolved and
//! expanded in topological order before anything spawns, so a resolution
//! failure anywhere refuses the whole run instead of stopping halfway.
//! Within a stage, tasks execute in parallel.

use crate::core::diagnostics::{GraphError, ReferenceError, ResolutionError};
use crate::core::graph::{self, TaskGraph, TaskNode};
use crate::core::index::WorkspaceSnapshot;
use crate::core::logctx::LogContext;
use crate::core::references::TaskCatalog;
use crate::core::resolver;
use crate::models::{Overrides, TaskReference};
use crate::system::executor::{self, ExecutionError};
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("cannot run: {0}")]
    Root(ReferenceError),
    #[error("task '{task}' cannot be resolved: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Resolution {
        task: String,
        errors: Vec<ResolutionError>,
    },
    #[error("task '{task}' failed: {source}")]
    Execution {
        task: String,
        #[source]
        source: ExecutionError,
    },
}

/// One fully expanded task, ready to spawn.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub qualified_name: String,
    pub command: String,
    /// Directory of the declaring manifest; the command runs there.
    pub file: PathBuf,
    /// Resolved bindings, rendered, handed to the child as environment.
    pub env: HashMap<String, String>,
}

/// Stages of simultaneously runnable tasks, dependencies always in an
/// earlier stage.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub stages: Vec<Vec<PlannedTask>>,
}

impl ExecutionPlan {
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }
}

/// Builds the plan for `root` and its dependencies, or the whole workspace
/// when `root` is `None`. `root` may be a short or qualified task name.
pub fn plan(
    snapshot: &WorkspaceSnapshot,
    root: Option<&str>,
    overrides: &Overrides,
) -> Result<ExecutionPlan, EngineError> {
    let graph = graph::build_graph(snapshot.tasks())?;

    let root_qualified = match root {
        Some(name) => Some(resolve_root(&graph, name)?),
        None => None,
    };

    let order: Vec<&TaskNode> = match &root_qualified {
        // The root came out of this graph, so the subgraph always exists.
        Some(q) => graph.execution_order_for(q).unwrap_or_default(),
        None => graph.topo_order(),
    };

    let mut expanded: HashMap<String, String> = HashMap::new();
    let mut planned: HashMap<String, PlannedTask> = HashMap::new();

    for node in &order {
        let task = &node.task;

        // Same chain the diagnostics path uses: ancestor param defaults are
        // visible to dependents, so `test` can reuse the `target` its
        // dependency `build` declares.
        let chain = snapshot.static_chain(task);
        let bindings = resolver::resolve_variables(task, &chain, overrides).map_err(|errors| {
            EngineError::Resolution {
                task: task.qualified_name.clone(),
                errors,
            }
        })?;

        // Referenced tasks were expanded earlier in the topological walk.
        let inlined: HashMap<String, String> = node
            .resolved_refs
            .iter()
            .filter_map(|(written, qualified)| {
                expanded
                    .get(qualified)
                    .map(|cmd| (written.clone(), cmd.clone()))
            })
            .collect();
        let command = resolver::expand_command(task, &bindings, &inlined);
        debug!("planned {}: {}", task.qualified_name, command);

        let mut env: HashMap<String, String> = bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.render()))
            .collect();
        env.insert("TASKTREE_TASK".to_string(), task.qualified_name.clone());

        expanded.insert(task.qualified_name.clone(), command.clone());
        planned.insert(
            task.qualified_name.clone(),
            PlannedTask {
                qualified_name: task.qualified_name.clone(),
                command,
                file: task.file.clone(),
                env,
            },
        );
    }

    let stage_nodes = match &root_qualified {
        Some(q) => graph.stages_for(q).unwrap_or_default(),
        None => graph.stages(),
    };
    let stages = stage_nodes
        .iter()
        .map(|stage| {
            stage
                .iter()
                .filter_map(|n| planned.get(&n.task.qualified_name).cloned())
                .collect()
        })
        .collect();

    Ok(ExecutionPlan { stages })
}

/// Runs a plan stage by stage, tasks within a stage in parallel. The first
/// failure wins the race to be reported; its stage still drains.
pub fn run(plan: &ExecutionPlan, ctx: &LogContext) -> Result<(), EngineError> {
    for (i, stage) in plan.stages.iter().enumerate() {
        ctx.debug(&format!("stage {} of {}", i + 1, plan.stages.len()));
        stage.par_iter().try_for_each(|task| {
            ctx.info(&format!("[{}] {}", task.qualified_name, task.command));
            executor::execute_command(&task.command, workdir(&task.file), &task.env).map_err(
                |source| EngineError::Execution {
                    task: task.qualified_name.clone(),
                    source,
                },
            )
        })?;
    }
    Ok(())
}

fn workdir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Resolves the task name given on the command line: qualified names match
/// exactly, short names must be unique across the workspace.
pub fn resolve_root(graph: &TaskGraph, name: &str) -> Result<String, EngineError> {
    let tasks: Vec<_> = graph.nodes().iter().map(|n| n.task.clone()).collect();
    let catalog = TaskCatalog::new(&tasks);
    let reference = TaskReference {
        target: name.to_string(),
        span: Default::default(),
    };
    catalog
        .resolve(&reference, "")
        .map(|t| t.qualified_name.clone())
        .map_err(EngineError::Root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::WorkspaceIndex;
    use std::path::PathBuf;

    fn snapshot(files: &[(&str, &str)]) -> WorkspaceSnapshot {
        let index = WorkspaceIndex::new();
        for (path, text) in files {
            index.update(&PathBuf::from(path), text);
        }
        index.snapshot()
    }

    fn commands(plan: &ExecutionPlan) -> HashMap<String, String> {
        plan.stages
            .iter()
            .flatten()
            .map(|t| (t.qualified_name.clone(), t.command.clone()))
            .collect()
    }

    const PIPELINE: &[(&str, &str)] = &[(
        "ci.tasks.toml",
        "[tasks.build]\nrun = \"compile {target}\"\n\
         [tasks.build.params.target]\ndefault = \"release\"\n\
         [tasks.test]\nrun = \"run-tests {target}\"\ndeps = [\"build\"]\n\
         [tasks.deploy]\nrun = \"ship\"\ndeps = [\"test\"]\n",
    )];

    #[test]
    fn test_dependent_inherits_ancestor_param_default() {
        let plan = plan(&snapshot(PIPELINE), None, &Overrides::new()).expect("plans");
        let cmds = commands(&plan);
        assert_eq!(cmds["ci::build"], "compile release");
        assert_eq!(cmds["ci::test"], "run-tests release");
        assert_eq!(cmds["ci::deploy"], "ship");
    }

    #[test]
    fn test_override_wins_everywhere() {
        let mut overrides = Overrides::new();
        overrides.insert("target".into(), crate::models::Value::String("debug".into()));
        let plan = plan(&snapshot(PIPELINE), None, &overrides).expect("plans");
        let cmds = commands(&plan);
        assert_eq!(cmds["ci::build"], "compile debug");
        assert_eq!(cmds["ci::test"], "run-tests debug");
    }

    #[test]
    fn test_root_limits_the_plan_to_its_closure() {
        let plan = plan(&snapshot(PIPELINE), Some("test"), &Overrides::new()).expect("plans");
        let cmds = commands(&plan);
        assert_eq!(cmds.len(), 2);
        assert!(cmds.contains_key("ci::build"));
        assert!(cmds.contains_key("ci::test"));
    }

    #[test]
    fn test_unknown_root_is_refused() {
        let err = plan(&snapshot(PIPELINE), Some("ghost"), &Overrides::new());
        assert!(matches!(err, Err(EngineError::Root(_))));
    }

    #[test]
    fn test_task_reference_inlines_the_expanded_command() {
        let files: &[(&str, &str)] = &[(
            "ci.tasks.toml",
            "[tasks.build]\nrun = \"compile {target:-debug}\"\n\
             [tasks.all]\nrun = \"{task::build} && echo done\"\n",
        )];
        let plan = plan(&snapshot(files), None, &Overrides::new()).expect("plans");
        let cmds = commands(&plan);
        assert_eq!(cmds["ci::all"], "compile debug && echo done");
    }

    #[test]
    fn test_undefined_variable_refuses_the_whole_plan() {
        let files: &[(&str, &str)] = &[(
            "ci.tasks.toml",
            "[tasks.a]\nrun = \"echo {missing}\"\n",
        )];
        match plan(&snapshot(files), None, &Overrides::new()) {
            Err(EngineError::Resolution { task, errors }) => {
                assert_eq!(task, "ci::a");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_cycle_refuses_the_plan() {
        let files: &[(&str, &str)] = &[(
            "ci.tasks.toml",
            "[tasks.a]\nrun = \"x\"\ndeps = [\"b\"]\n[tasks.b]\nrun = \"y\"\ndeps = [\"a\"]\n",
        )];
        assert!(matches!(
            plan(&snapshot(files), None, &Overrides::new()),
            Err(EngineError::Graph(GraphError::CyclicDependency { .. }))
        ));
    }

    #[test]
    fn test_workspace_vars_reach_every_file() {
        let files: &[(&str, &str)] = &[
            ("workspace.tasks.toml", "[vars]\nregistry = \"ghcr.io\"\n"),
            ("app.tasks.toml", "[tasks.push]\nrun = \"push {registry}\"\n"),
        ];
        let plan = plan(&snapshot(files), None, &Overrides::new()).expect("plans");
        assert_eq!(commands(&plan)["app::push"], "push ghcr.io");
    }

    #[test]
    fn test_plan_stages_match_dependency_depth() {
        let plan = plan(&snapshot(PIPELINE), None, &Overrides::new()).expect("plans");
        let stages: Vec<Vec<&str>> = plan
            .stages
            .iter()
            .map(|s| s.iter().map(|t| t.qualified_name.as_str()).collect())
            .collect();
        assert_eq!(
            stages,
            vec![vec!["ci::build"], vec!["ci::test"], vec!["ci::deploy"]]
        );
    }
}
