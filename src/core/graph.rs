// src/core/graph.rs

//! Workspace dependency graph: reference validation, cycle detection,
//! deterministic topological ordering and parallel stage computation.
//!
//! Nodes are stored sorted by qualified name, so node index order doubles as
//! the lexical tie-break everywhere an ordering choice exists. The same
//! workspace always yields the same order and the same stages.

use crate::core::diagnostics::{GraphError, ReferenceError};
use crate::core::references::{self, TaskCatalog};
use crate::models::Task;
use log::debug;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// One task plus its validated edges.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub task: Task,
    /// Indices of dependency nodes (tasks that must complete first),
    /// covering both `deps` entries and `{task::...}` placeholders.
    pub deps: Vec<usize>,
    /// Reference targets as written, mapped to qualified names. Used to
    /// inline referenced commands and to explain edges in `tree` output.
    pub resolved_refs: HashMap<String, String>,
}

/// A validated, acyclic task graph over one workspace snapshot.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<String, usize>,
}

/// Validates references and builds the graph. Fails as a whole on dangling
/// references or a dependency cycle; there is no partially ordered result.
pub fn build_graph(mut tasks: Vec<Task>) -> Result<TaskGraph, GraphError> {
    tasks.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));

    // Qualified names must be unique before they can serve as node keys;
    // two files with the same stem collide here.
    let duplicates: Vec<(String, Vec<std::path::PathBuf>)> = tasks
        .chunk_by(|a, b| a.qualified_name == b.qualified_name)
        .filter(|group| group.len() > 1)
        .map(|group| {
            (
                group[0].qualified_name.clone(),
                group.iter().map(|t| t.file.clone()).collect(),
            )
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(GraphError::DuplicateTaskNames(duplicates));
    }

    let mut resolved_per_task = Vec::with_capacity(tasks.len());
    let mut failures: Vec<(String, ReferenceError)> = Vec::new();
    {
        let catalog = TaskCatalog::new(&tasks);
        for task in &tasks {
            let (resolved, errors) = references::resolve_task_references(task, &catalog);
            failures.extend(
                errors
                    .into_iter()
                    .map(|e| (task.qualified_name.clone(), e)),
            );
            resolved_per_task.push(resolved);
        }
    }
    if !failures.is_empty() {
        return Err(GraphError::UnresolvedReferences(failures));
    }

    let index: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.qualified_name.clone(), i))
        .collect();

    let mut nodes = Vec::with_capacity(tasks.len());
    for (task, resolved_refs) in tasks.into_iter().zip(resolved_per_task) {
        let mut deps: Vec<usize> = resolved_refs.values().map(|q| index[q]).collect();
        deps.sort_unstable();
        deps.dedup();
        nodes.push(TaskNode {
            task,
            deps,
            resolved_refs,
        });
    }

    let graph = TaskGraph { nodes, index };
    if let Some(cycle) = graph.find_cycle() {
        return Err(GraphError::CyclicDependency { cycle });
    }
    debug!("built task graph with {} node(s)", graph.nodes.len());
    Ok(graph)
}

impl TaskGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes sorted by qualified name.
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn get(&self, qualified_name: &str) -> Option<&TaskNode> {
        self.index.get(qualified_name).map(|&i| &self.nodes[i])
    }

    /// Dependencies-first execution order over the whole graph. Among the
    /// ready candidates the lexically smallest qualified name always runs
    /// first, making the order fully deterministic.
    pub fn topo_order(&self) -> Vec<&TaskNode> {
        self.topo_order_of(&(0..self.nodes.len()).collect::<Vec<_>>())
    }

    /// Execution order restricted to `root` and its transitive dependencies.
    /// Returns `None` for an unknown root.
    pub fn execution_order_for(&self, root: &str) -> Option<Vec<&TaskNode>> {
        let root_idx = *self.index.get(root)?;
        Some(self.topo_order_of(&self.closure(root_idx)))
    }

    /// Groups the whole graph into parallel stages: every task in a stage
    /// depends only on tasks in earlier stages, so a stage's members may run
    /// simultaneously. Stage membership is by longest dependency chain, so
    /// it is deterministic as well.
    pub fn stages(&self) -> Vec<Vec<&TaskNode>> {
        self.stages_of(&(0..self.nodes.len()).collect::<Vec<_>>())
    }

    /// Parallel stages restricted to `root` and its transitive dependencies.
    pub fn stages_for(&self, root: &str) -> Option<Vec<Vec<&TaskNode>>> {
        let root_idx = *self.index.get(root)?;
        Some(self.stages_of(&self.closure(root_idx)))
    }

    /// Transitive dependency closure of one node, itself included.
    fn closure(&self, root: usize) -> Vec<usize> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            stack.extend(self.nodes[i].deps.iter().copied());
        }
        (0..self.nodes.len()).filter(|&i| seen[i]).collect()
    }

    /// Kahn's algorithm over a node subset, min-heap on node index for the
    /// lexical tie-break. The subset is assumed dependency-closed.
    fn topo_order_of(&self, subset: &[usize]) -> Vec<&TaskNode> {
        let mut indegree: HashMap<usize, usize> =
            subset.iter().map(|&i| (i, self.nodes[i].deps.len())).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in subset {
            for &dep in &self.nodes[i].deps {
                dependents.entry(dep).or_default().push(i);
            }
        }

        let mut heap: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse(i)) = heap.pop() {
            order.push(&self.nodes[i]);
            for &next in dependents.get(&i).map_or(&[][..], Vec::as_slice) {
                if let Some(deg) = indegree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        heap.push(Reverse(next));
                    }
                }
            }
        }
        order
    }

    /// Rounds of simultaneously ready tasks over a dependency-closed subset.
    fn stages_of(&self, subset: &[usize]) -> Vec<Vec<&TaskNode>> {
        let mut indegree: HashMap<usize, usize> =
            subset.iter().map(|&i| (i, self.nodes[i].deps.len())).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in subset {
            for &dep in &self.nodes[i].deps {
                dependents.entry(dep).or_default().push(i);
            }
        }

        let mut ready: Vec<usize> = subset
            .iter()
            .copied()
            .filter(|i| indegree[i] == 0)
            .collect();
        let mut stages = Vec::new();
        while !ready.is_empty() {
            ready.sort_unstable();
            let mut next = Vec::new();
            for &i in &ready {
                for &dependent in dependents.get(&i).map_or(&[][..], Vec::as_slice) {
                    if let Some(deg) = indegree.get_mut(&dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            stages.push(ready.iter().map(|&i| &self.nodes[i]).collect());
            ready = next;
        }
        stages
    }

    /// Iterative three-color DFS. Returns the first cycle found, listed in
    /// dependency order starting from its lexically chosen entry point.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            // Each frame tracks which outgoing edge to try next.
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;
            while let Some((node, edge)) = stack.last().copied() {
                if let Some(&dep) = self.nodes[node].deps.get(edge) {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push((dep, 0));
                        }
                        Color::Gray => {
                            // The gray path from `dep` down to `node` is the cycle.
                            let from = stack
                                .iter()
                                .position(|&(n, _)| n == dep)
                                .unwrap_or(0);
                            return Some(
                                stack[from..]
                                    .iter()
                                    .map(|&(n, _)| self.nodes[n].task.qualified_name.clone())
                                    .collect(),
                            );
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest;
    use std::path::PathBuf;

    fn parse_all(files: &[(&str, &str)]) -> Vec<Task> {
        let mut all = Vec::new();
        for (file, text) in files {
            let parsed = manifest::parse_manifest(&PathBuf::from(file), text);
            assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
            all.extend(parsed.tasks);
        }
        all
    }

    fn names(nodes: &[&TaskNode]) -> Vec<String> {
        nodes.iter().map(|n| n.task.qualified_name.clone()).collect()
    }

    const PIPELINE: &[(&str, &str)] = &[(
        "ci.tasks.toml",
        "[tasks.build]\nrun = \"compile\"\n\
         [tasks.test]\nrun = \"check\"\ndeps = [\"build\"]\n\
         [tasks.lint]\nrun = \"lint\"\ndeps = [\"build\"]\n\
         [tasks.deploy]\nrun = \"ship\"\ndeps = [\"test\", \"lint\"]\n",
    )];

    #[test]
    fn test_topo_order_is_dependencies_first_and_lexical() {
        let graph = build_graph(parse_all(PIPELINE)).expect("valid graph");
        let order = names(&graph.topo_order());
        assert_eq!(order, vec!["ci::build", "ci::lint", "ci::test", "ci::deploy"]);
    }

    #[test]
    fn test_topo_order_is_stable_across_rebuilds() {
        let a = build_graph(parse_all(PIPELINE)).expect("valid graph");
        let b = build_graph(parse_all(PIPELINE)).expect("valid graph");
        assert_eq!(names(&a.topo_order()), names(&b.topo_order()));
    }

    #[test]
    fn test_stages_group_independent_tasks() {
        let graph = build_graph(parse_all(PIPELINE)).expect("valid graph");
        let stages: Vec<Vec<String>> = graph
            .stages()
            .iter()
            .map(|stage| names(stage))
            .collect();
        assert_eq!(
            stages,
            vec![
                vec!["ci::build".to_string()],
                vec!["ci::lint".to_string(), "ci::test".to_string()],
                vec!["ci::deploy".to_string()],
            ]
        );
    }

    #[test]
    fn test_subgraph_closure_excludes_unrelated_tasks() {
        let graph = build_graph(parse_all(PIPELINE)).expect("valid graph");
        let order = names(&graph.execution_order_for("ci::test").expect("known root"));
        assert_eq!(order, vec!["ci::build", "ci::test"]);
        assert!(graph.execution_order_for("ci::ghost").is_none());
    }

    #[test]
    fn test_two_task_cycle_reports_both_members() {
        let tasks = parse_all(&[(
            "ci.tasks.toml",
            "[tasks.a]\nrun = \"x\"\ndeps = [\"b\"]\n[tasks.b]\nrun = \"y\"\ndeps = [\"a\"]\n",
        )]);
        let err = build_graph(tasks).expect_err("cycle");
        match err {
            GraphError::CyclicDependency { cycle } => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&"ci::a".to_string()));
                assert!(cycle.contains(&"ci::b".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let tasks = parse_all(&[(
            "ci.tasks.toml",
            "[tasks.a]\nrun = \"x\"\ndeps = [\"a\"]\n",
        )]);
        assert!(matches!(
            build_graph(tasks),
            Err(GraphError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_template_reference_creates_an_edge() {
        let tasks = parse_all(&[(
            "ci.tasks.toml",
            "[tasks.build]\nrun = \"compile\"\n[tasks.all]\nrun = \"{task::build} && echo ok\"\n",
        )]);
        let graph = build_graph(tasks).expect("valid graph");
        let all = graph.get("ci::all").expect("node");
        assert_eq!(all.deps.len(), 1);
        assert_eq!(
            all.resolved_refs.get("build").map(String::as_str),
            Some("ci::build")
        );
    }

    #[test]
    fn test_same_file_stem_in_two_directories_is_rejected() {
        // Both manifests have stem `ci`, so their tasks collide on the
        // qualified name. The graph must refuse rather than silently run
        // one copy twice.
        let tasks = parse_all(&[
            ("ci.tasks.toml", "[tasks.build]\nrun = \"compile\"\n"),
            ("sub/ci.tasks.toml", "[tasks.build]\nrun = \"compile sub\"\n"),
        ]);
        match build_graph(tasks).expect_err("duplicate") {
            GraphError::DuplicateTaskNames(duplicates) => {
                assert_eq!(duplicates.len(), 1);
                let (name, files) = &duplicates[0];
                assert_eq!(name, "ci::build");
                assert_eq!(files.len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_dangling_reference_blocks_the_graph() {
        let tasks = parse_all(&[(
            "ci.tasks.toml",
            "[tasks.a]\nrun = \"x\"\ndeps = [\"ghost\"]\n",
        )]);
        match build_graph(tasks).expect_err("dangling") {
            GraphError::UnresolvedReferences(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "ci::a");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
