// src/core/index.rs

//! Incremental workspace index.
//!
//! Holds the parsed state of every manifest file and serves both consumers:
//! the execution path (full-graph snapshots) and the editor path
//! (diagnostics, positional lookups, completion candidates). Entries are
//! immutable `Arc` snapshots replaced wholesale on update, so a reader that
//! grabbed an entry before an update keeps a consistent view and concurrent
//! readers see either the pre- or post-update state, never a mix.

use crate::constants::WORKSPACE_MANIFEST;
use crate::core::diagnostics::{Diagnostic, LineIndex};
use crate::core::manifest::{self, ParsedFile};
use crate::core::references::{self, TaskCatalog};
use crate::core::resolver;
use crate::core::scope::{Scope, ScopeChain, ScopeKind};
use crate::models::{
    CompletionItem, CompletionKind, Overrides, Task, Value, VariableHit, VariableOrigin,
};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// The parsed state of one manifest file at one version. Never mutated;
/// every update produces a fresh entry.
#[derive(Debug)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Monotonically increasing per file; same-file updates are
    /// last-write-wins.
    pub version: u64,
    pub text: String,
    pub parsed: ParsedFile,
    pub lines: LineIndex,
}

/// Thread-safe index over all manifest files of a workspace.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    files: RwLock<HashMap<PathBuf, Arc<FileEntry>>>,
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)indexes one file. Never fails: malformed input yields an entry
    /// whose diagnostics carry the problem. Parsing happens outside the
    /// lock. Returns the entry's new version.
    pub fn update(&self, path: &Path, text: &str) -> u64 {
        let parsed = manifest::parse_manifest(path, text);
        let lines = LineIndex::new(text);
        trace!(
            "indexed {}: {} task(s), {} error(s)",
            path.display(),
            parsed.tasks.len(),
            parsed.errors.len()
        );

        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let version = files.get(path).map_or(1, |entry| entry.version + 1);
        files.insert(
            path.to_path_buf(),
            Arc::new(FileEntry {
                path: path.to_path_buf(),
                version,
                text: text.to_string(),
                parsed,
                lines,
            }),
        );
        version
    }

    /// Drops one file from the index. Returns whether it was present.
    pub fn remove(&self, path: &Path) -> bool {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let removed = files.remove(path).is_some();
        if removed {
            debug!("removed {} from index", path.display());
        }
        removed
    }

    pub fn entry(&self, path: &Path) -> Option<Arc<FileEntry>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// An immutable view of the whole workspace at this instant. Graph
    /// builds and cross-file queries go through snapshots so they cannot
    /// observe a half-applied update.
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let mut files: Vec<Arc<FileEntry>> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        WorkspaceSnapshot { files }
    }

    /// Every task across the workspace, sorted by qualified name.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.snapshot().tasks()
    }

    /// All diagnostics for one file: its own parse errors, reference checks
    /// against the current workspace, and static variable-resolution checks.
    /// `None` if the file is not indexed.
    pub fn diagnostics(&self, path: &Path) -> Option<Vec<Diagnostic>> {
        let snapshot = self.snapshot();
        let entry = snapshot.entry(path)?;
        let mut out: Vec<Diagnostic> = entry
            .parsed
            .errors
            .iter()
            .map(|e| Diagnostic::from_parse(e, &entry.lines))
            .collect();

        let tasks = snapshot.tasks();
        let catalog = TaskCatalog::new(&tasks);
        for task in &entry.parsed.tasks {
            let (_, reference_errors) = references::resolve_task_references(task, &catalog);
            out.extend(
                reference_errors
                    .iter()
                    .map(|e| Diagnostic::from_reference(e, &entry.lines)),
            );

            // Static check only: overrides may still bind a variable at run
            // time, which is why UndefinedVariable surfaces as a warning.
            let chain = snapshot.static_chain(task);
            if let Err(resolution_errors) =
                resolver::resolve_variables(task, &chain, &Overrides::new())
            {
                out.extend(
                    resolution_errors
                        .iter()
                        .map(|e| Diagnostic::from_resolution(e, &entry.lines)),
                );
            }
        }

        out.sort_by_key(|d| (d.span.start, d.span.end));
        Some(out)
    }

    /// The task whose manifest table contains `offset`, if any.
    pub fn task_at(&self, path: &Path, offset: usize) -> Option<Task> {
        let entry = self.entry(path)?;
        entry
            .parsed
            .tasks
            .iter()
            .find(|t| t.span.contains(offset))
            .cloned()
    }

    /// The variable placeholder at `offset`, together with the innermost
    /// statically visible scope binding it (if any).
    pub fn variable_at(&self, path: &Path, offset: usize) -> Option<VariableHit> {
        let snapshot = self.snapshot();
        let entry = snapshot.entry(path)?;
        let task = entry.parsed.tasks.iter().find(|t| t.span.contains(offset))?;
        let var = task.variables().find(|v| v.span.contains(offset))?;
        let chain = snapshot.static_chain(task);
        let origin = chain.lookup(&var.name).map(|(_, scope)| VariableOrigin {
            scope: scope.kind,
            label: scope.label.clone(),
        });
        Some(VariableHit {
            name: var.name.clone(),
            origin,
        })
    }

    /// Completion candidates at a position inside a task's command template:
    /// every statically visible variable, then every task in the workspace
    /// as a reference target. Empty outside command templates.
    pub fn completions_at(&self, path: &Path, offset: usize) -> Vec<CompletionItem> {
        let snapshot = self.snapshot();
        let Some(entry) = snapshot.entry(path) else {
            return Vec::new();
        };
        let Some(task) = entry
            .parsed
            .tasks
            .iter()
            .find(|t| t.command_span.contains(offset))
        else {
            return Vec::new();
        };

        let chain = snapshot.static_chain(task);
        let mut items: Vec<CompletionItem> = chain
            .visible_names()
            .into_iter()
            .map(|name| {
                let detail = chain
                    .lookup(&name)
                    .map(|(_, scope)| scope.label.clone());
                CompletionItem {
                    label: name,
                    kind: CompletionKind::Variable,
                    detail,
                }
            })
            .collect();

        let mut tasks: Vec<CompletionItem> = snapshot
            .tasks()
            .into_iter()
            .filter(|t| t.qualified_name != task.qualified_name)
            .map(|t| CompletionItem {
                label: format!("task::{}", t.qualified_name),
                kind: CompletionKind::Task,
                detail: t.desc,
            })
            .collect();
        tasks.sort_by(|a, b| a.label.cmp(&b.label));
        items.append(&mut tasks);
        items
    }
}

/// An immutable view of all indexed files at one instant.
#[derive(Debug, Clone)]
pub struct WorkspaceSnapshot {
    files: Vec<Arc<FileEntry>>,
}

impl WorkspaceSnapshot {
    pub fn files(&self) -> &[Arc<FileEntry>] {
        &self.files
    }

    pub fn entry(&self, path: &Path) -> Option<&Arc<FileEntry>> {
        self.files.iter().find(|e| e.path == path)
    }

    /// Every task in the snapshot, sorted by qualified name.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .files
            .iter()
            .flat_map(|e| e.parsed.tasks.iter().cloned())
            .collect();
        tasks.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        tasks
    }

    /// `[vars]` of the root workspace manifest, if one is indexed.
    pub fn workspace_vars(&self) -> HashMap<String, Value> {
        self.files
            .iter()
            .find(|e| {
                e.path
                    .file_name()
                    .is_some_and(|n| n == WORKSPACE_MANIFEST)
            })
            .map(|e| e.parsed.vars.clone())
            .unwrap_or_default()
    }

    /// The scope chain of one task: workspace globals, the declaring file's
    /// vars, parameter defaults inherited from transitive dependencies
    /// (deepest first, so nearer ancestors shadow farther ones), then the
    /// task's own parameter defaults. The engine and the diagnostics path
    /// share this, so what `check` reports matches what `run` resolves.
    pub fn static_chain(&self, task: &Task) -> ScopeChain {
        let mut chain = ScopeChain::new();
        chain.push(Scope::new(
            ScopeKind::Workspace,
            "workspace",
            self.workspace_vars(),
        ));
        if let Some(entry) = self.entry(&task.file) {
            chain.push(Scope::new(
                ScopeKind::File,
                entry.parsed.namespace.clone(),
                entry.parsed.vars.clone(),
            ));
        }

        let tasks = self.tasks();
        let catalog = TaskCatalog::new(&tasks);
        let mut seen = HashSet::from([task.qualified_name.clone()]);
        let mut ancestors = Vec::new();
        collect_ancestors(task, &catalog, &mut seen, &mut ancestors);
        for ancestor in ancestors {
            if let Some(scope) = param_scope(ancestor) {
                chain.push(scope);
            }
        }

        if let Some(scope) = param_scope(task) {
            chain.push(scope);
        }
        chain
    }
}

/// Post-order walk over a task's resolvable references: dependencies land
/// before their dependents, unresolvable or already-seen targets are
/// skipped, so the walk terminates even on a cyclic workspace.
fn collect_ancestors<'a>(
    task: &Task,
    catalog: &TaskCatalog<'a>,
    seen: &mut HashSet<String>,
    out: &mut Vec<&'a Task>,
) {
    for reference in task.references() {
        let Ok(dep) = catalog.resolve(reference, &task.namespace) else {
            continue;
        };
        if seen.insert(dep.qualified_name.clone()) {
            collect_ancestors(dep, catalog, seen, out);
            out.push(dep);
        }
    }
}

/// A task's parameter defaults as a scope, or `None` if it has no defaults.
fn param_scope(task: &Task) -> Option<Scope> {
    let bindings: HashMap<String, Value> = task
        .params
        .iter()
        .filter_map(|p| p.default.clone().map(|v| (p.name.clone(), v)))
        .collect();
    if bindings.is_empty() {
        None
    } else {
        Some(Scope::new(
            ScopeKind::Task,
            task.qualified_name.clone(),
            bindings,
        ))
    }
}
