// src/core/diagnostics.rs

//! Error taxonomy for the semantic core.
//!
//! Parse, resolution and reference errors are always *collected*, never
//! raised as process-fatal: every operation that can hit them returns them
//! alongside whatever partial result is still valid, so both the execution
//! path and the editor path keep functioning around invalid tasks. The one
//! exception is [`GraphError`], which blocks producing any execution order.

use crate::models::{Span, ValueKind};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Non-fatal errors found while parsing a manifest or a command template.
/// The file stays partially usable after any of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A placeholder was opened but never closed, or a stray brace appeared.
    #[error("malformed placeholder '{text}'")]
    MalformedPlaceholder { text: String, span: Span },
    /// Token content matches neither the variable nor the task-reference
    /// grammar. The token is kept as opaque literal text downstream.
    #[error("ambiguous token '{{{text}}}': neither a variable nor a task reference")]
    AmbiguousToken { text: String, span: Span },
    /// The TOML structure of the manifest itself is invalid.
    #[error("invalid manifest: {message}")]
    Manifest { message: String, span: Span },
    /// A `deps` list names the same target twice. The duplicate is dropped.
    #[error("duplicate dependency '{target}'")]
    DuplicateDependency { target: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            Self::MalformedPlaceholder { span, .. }
            | Self::AmbiguousToken { span, .. }
            | Self::Manifest { span, .. }
            | Self::DuplicateDependency { span, .. } => *span,
        }
    }
}

/// Errors scoped to resolving one task's variables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// No binding anywhere in the scope chain and no inline default.
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Span },
    /// A binding exists but cannot be converted to the declared type.
    #[error("type mismatch for '{name}': expected {expected}, got '{actual}'")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        actual: String,
        span: Span,
    },
}

impl ResolutionError {
    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable { span, .. } | Self::TypeMismatch { span, .. } => *span,
        }
    }
}

/// Errors scoped to a single task reference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("unknown task '{name}'")]
    UnknownTask { name: String, span: Span },
    /// An unqualified cross-file reference matched more than one task.
    #[error("ambiguous task reference '{name}': matches {}", .candidates.join(", "))]
    AmbiguousTask {
        name: String,
        candidates: Vec<String>,
        span: Span,
    },
}

impl ReferenceError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownTask { span, .. } | Self::AmbiguousTask { span, .. } => *span,
        }
    }
}

/// Errors scoped to the whole-workspace graph build. Either of these refuses
/// to hand out a graph: a cycle cannot be partially ordered around, and
/// unresolved references leave edges dangling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The full cycle in order, first task repeated nowhere. Any rotation of
    /// the same loop is equivalent.
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    /// All reference failures collected across the workspace, each paired
    /// with the qualified name of the task that made the reference.
    #[error("{} unresolved task reference(s) in the workspace", .0.len())]
    UnresolvedReferences(Vec<(String, ReferenceError)>),
    /// Two manifests produced the same qualified name (same file stem, same
    /// task name), so references to it cannot be attributed. Each entry
    /// pairs the colliding name with every file defining it.
    #[error("duplicate task name(s) in the workspace: {}", .0.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(", "))]
    DuplicateTaskNames(Vec<(String, Vec<PathBuf>)>),
}

// --- EDITOR-FACING DIAGNOSTICS ---

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A rendered diagnostic for one source range, as handed to the editor
/// integration or printed by `tasktree check`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `unknown-task`.
    pub code: &'static str,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

impl Diagnostic {
    pub fn from_parse(err: &ParseError, lines: &LineIndex) -> Self {
        let code = match err {
            ParseError::MalformedPlaceholder { .. } => "malformed-placeholder",
            ParseError::AmbiguousToken { .. } => "ambiguous-token",
            ParseError::Manifest { .. } => "invalid-manifest",
            ParseError::DuplicateDependency { .. } => "duplicate-dependency",
        };
        Self::at(Severity::Error, code, err.to_string(), err.span(), lines)
    }

    pub fn from_reference(err: &ReferenceError, lines: &LineIndex) -> Self {
        let code = match err {
            ReferenceError::UnknownTask { .. } => "unknown-task",
            ReferenceError::AmbiguousTask { .. } => "ambiguous-task",
        };
        Self::at(Severity::Error, code, err.to_string(), err.span(), lines)
    }

    pub fn from_resolution(err: &ResolutionError, lines: &LineIndex) -> Self {
        let (severity, code) = match err {
            // Undefined variables may still be bound at run time through
            // caller overrides, so the editor reports them as warnings.
            ResolutionError::UndefinedVariable { .. } => (Severity::Warning, "undefined-variable"),
            ResolutionError::TypeMismatch { .. } => (Severity::Error, "type-mismatch"),
        };
        Self::at(severity, code, err.to_string(), err.span(), lines)
    }

    fn at(
        severity: Severity,
        code: &'static str,
        message: String,
        span: Span,
        lines: &LineIndex,
    ) -> Self {
        let (line, column) = lines.position(span.start);
        Self {
            severity,
            code,
            message,
            line,
            column,
            span,
        }
    }
}

// --- LINE INDEX ---

/// Byte-offset to 1-based line/column conversion for one file snapshot.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Returns the (line, column) of a byte offset, both 1-based.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&s| s <= offset);
        let start = self.line_starts.get(line - 1).copied().unwrap_or(0);
        (line as u32, (offset - start + 1) as u32)
    }
}
