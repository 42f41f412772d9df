// src/core/scope.rs

//! Variable scope chains.
//!
//! A chain is an explicit ordered list of binding contexts, searched
//! innermost-first with first match winning. It mirrors the containment
//! hierarchy (workspace -> file -> inherited task params -> own params), so
//! it is tree-shaped and cycle-free by construction.

use crate::models::Value;
use std::collections::{BTreeSet, HashMap};

/// Which level of the containment hierarchy a scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// `[vars]` of the workspace manifest.
    Workspace,
    /// `[vars]` of the declaring file.
    File,
    /// Parameter defaults of a task (own or inherited from an ancestor).
    Task,
}

/// One binding context plus a label naming its origin (file or task).
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub label: String,
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new(kind: ScopeKind, label: impl Into<String>, bindings: HashMap<String, Value>) -> Self {
        Self {
            kind,
            label: label.into(),
            bindings,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

/// Ordered scope list, outermost first. Lookup walks it from the end.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scope as the new innermost context.
    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Innermost-first lookup; returns the binding and the scope it came from.
    pub fn lookup(&self, name: &str) -> Option<(&Value, &Scope)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).map(|v| (v, scope)))
    }

    /// Every name visible anywhere in the chain, sorted and deduplicated.
    /// Used for completion candidates.
    pub fn visible_names(&self) -> BTreeSet<String> {
        self.scopes
            .iter()
            .flat_map(|s| s.names().map(str::to_string))
            .collect()
    }
}
