// src/core/references.rs

//! Task reference resolution.
//!
//! Maps reference targets as written (`build`, `ci::build`) to unique
//! qualified task names. Unqualified targets resolve in two tiers: the
//! declaring file first, then the rest of the workspace. A cross-file match
//! that is not unique is an error naming every candidate, never a silent
//! pick.

use crate::core::diagnostics::ReferenceError;
use crate::models::{QUALIFIER, Task, TaskReference};
use std::collections::HashMap;

/// Lookup tables over every task of a workspace snapshot.
#[derive(Debug)]
pub struct TaskCatalog<'a> {
    by_qualified: HashMap<&'a str, &'a Task>,
    by_name: HashMap<&'a str, Vec<&'a Task>>,
}

impl<'a> TaskCatalog<'a> {
    pub fn new(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut by_qualified = HashMap::new();
        let mut by_name: HashMap<&'a str, Vec<&'a Task>> = HashMap::new();
        for task in tasks {
            by_qualified.insert(task.qualified_name.as_str(), task);
            by_name.entry(task.name.as_str()).or_default().push(task);
        }
        for group in by_name.values_mut() {
            group.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        }
        Self {
            by_qualified,
            by_name,
        }
    }

    pub fn get(&self, qualified: &str) -> Option<&'a Task> {
        self.by_qualified.get(qualified).copied()
    }

    /// Resolves one reference made from inside `origin_namespace`.
    pub fn resolve(
        &self,
        reference: &TaskReference,
        origin_namespace: &str,
    ) -> Result<&'a Task, ReferenceError> {
        let target = reference.target.as_str();

        if target.contains(QUALIFIER) {
            return self.get(target).ok_or_else(|| ReferenceError::UnknownTask {
                name: target.to_string(),
                span: reference.span,
            });
        }

        // Tier one: the declaring file shadows the rest of the workspace.
        let local = format!("{}{}{}", origin_namespace, QUALIFIER, target);
        if let Some(task) = self.get(&local) {
            return Ok(task);
        }

        // Tier two: workspace-wide, unique match required.
        let candidates = self.by_name.get(target).map_or(&[][..], Vec::as_slice);
        match candidates {
            [] => Err(ReferenceError::UnknownTask {
                name: target.to_string(),
                span: reference.span,
            }),
            [task] => Ok(*task),
            many => Err(ReferenceError::AmbiguousTask {
                name: target.to_string(),
                candidates: many.iter().map(|t| t.qualified_name.clone()).collect(),
                span: reference.span,
            }),
        }
    }
}

/// Resolves every reference one task makes. Returns the as-written ->
/// qualified mapping alongside all failures; a bad reference never hides
/// the good ones.
pub fn resolve_task_references(
    task: &Task,
    catalog: &TaskCatalog<'_>,
) -> (HashMap<String, String>, Vec<ReferenceError>) {
    let mut resolved = HashMap::new();
    let mut errors = Vec::new();
    for reference in task.references() {
        if resolved.contains_key(&reference.target) {
            continue;
        }
        match catalog.resolve(reference, &task.namespace) {
            Ok(found) => {
                resolved.insert(reference.target.clone(), found.qualified_name.clone());
            }
            Err(e) => errors.push(e),
        }
    }
    (resolved, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest;
    use std::path::PathBuf;

    fn tasks() -> Vec<Task> {
        let mut all = Vec::new();
        for (file, text) in [
            (
                "ci.tasks.toml",
                "[tasks.build]\nrun = \"compile\"\n[tasks.test]\nrun = \"check\"\ndeps = [\"build\"]\n",
            ),
            ("app.tasks.toml", "[tasks.build]\nrun = \"compile app\"\n[tasks.pack]\nrun = \"zip\"\n"),
            ("ops.tasks.toml", "[tasks.deploy]\nrun = \"{task::app::pack}\"\ndeps = [\"test\"]\n"),
        ] {
            let parsed = manifest::parse_manifest(&PathBuf::from(file), text);
            assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
            all.extend(parsed.tasks);
        }
        all
    }

    fn find<'a>(tasks: &'a [Task], qualified: &str) -> &'a Task {
        tasks
            .iter()
            .find(|t| t.qualified_name == qualified)
            .expect("task")
    }

    #[test]
    fn test_declaring_file_shadows_other_files() {
        let tasks = tasks();
        let catalog = TaskCatalog::new(&tasks);
        let test = find(&tasks, "ci::test");
        let (resolved, errors) = resolve_task_references(test, &catalog);
        assert!(errors.is_empty());
        // `build` exists in both ci and app; from ci it must stay local.
        assert_eq!(resolved.get("build").map(String::as_str), Some("ci::build"));
    }

    #[test]
    fn test_unique_cross_file_reference_resolves() {
        let tasks = tasks();
        let catalog = TaskCatalog::new(&tasks);
        let deploy = find(&tasks, "ops::deploy");
        let (resolved, errors) = resolve_task_references(deploy, &catalog);
        assert!(errors.is_empty());
        // `test` exists only in ci; `app::pack` is explicit.
        assert_eq!(resolved.get("test").map(String::as_str), Some("ci::test"));
        assert_eq!(resolved.get("app::pack").map(String::as_str), Some("app::pack"));
    }

    #[test]
    fn test_ambiguous_cross_file_reference_lists_candidates_sorted() {
        let tasks = tasks();
        let catalog = TaskCatalog::new(&tasks);
        let reference = TaskReference {
            target: "build".into(),
            span: Default::default(),
        };
        let err = catalog.resolve(&reference, "ops").expect_err("ambiguous");
        match err {
            ReferenceError::AmbiguousTask { candidates, .. } => {
                assert_eq!(candidates, vec!["app::build".to_string(), "ci::build".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_targets_unqualified_and_qualified() {
        let tasks = tasks();
        let catalog = TaskCatalog::new(&tasks);
        for target in ["nothing", "ci::nothing", "ghost::build"] {
            let reference = TaskReference {
                target: target.into(),
                span: Default::default(),
            };
            assert!(matches!(
                catalog.resolve(&reference, "ci"),
                Err(ReferenceError::UnknownTask { .. })
            ));
        }
    }
}
