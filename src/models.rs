// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Separator between a file namespace and a task name in qualified names.
pub const QUALIFIER: &str = "::";

// --- SOURCE POSITIONS ---

/// A half-open byte range into a manifest file.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Shifts a span that is relative to an embedded string (e.g. a `run`
    /// template) so it points into the enclosing file.
    pub fn rebase(&self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
        }
    }
}

// --- VALUES ---

/// The type tag a parameter or placeholder may declare.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Bool,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "bool" => Ok(Self::Bool),
            "list" => Ok(Self::List),
            _ => Err(()),
        }
    }
}

/// A variable value as declared in a manifest or supplied by a caller.
/// Uses `untagged` so manifests can write plain TOML scalars and arrays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
        }
    }

    /// Renders the value as it appears when substituted into a command.
    pub fn render(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Self::String(s) => s.clone(),
            Self::List(items) => items.join(" "),
        }
    }

    /// Checks convertibility into `kind`, returning the converted value.
    /// String values convert into any kind they can be parsed as; other
    /// conversions require an exact kind match or stringification.
    pub fn coerce(&self, kind: ValueKind) -> Result<Self, ()> {
        match (self, kind) {
            (v, k) if v.kind() == k => Ok(v.clone()),
            (v, ValueKind::String) => Ok(Self::String(v.render())),
            (Self::String(s), ValueKind::Number) => {
                s.trim().parse::<f64>().map(Self::Number).map_err(|_| ())
            }
            (Self::String(s), ValueKind::Bool) => match s.trim() {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                _ => Err(()),
            },
            (Self::String(s), ValueKind::List) => Ok(Self::List(vec![s.clone()])),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// --- TEMPLATE MODEL ---

/// A variable placeholder such as `{target}`, `{port:number}` or
/// `{tag:-latest}` inside a command template.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: String,
    pub hint: Option<ValueKind>,
    pub default: Option<String>,
    /// Exact byte span of the token in the source file.
    pub span: Span,
}

/// A task reference placeholder (`{task::build}`) or a `deps` entry.
/// `target` is the name as written, possibly `file::task` qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReference {
    pub target: String,
    pub span: Span,
}

/// One segment of a pre-parsed command template. The variant is chosen once
/// at parse time and never re-inspected dynamically downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateComponent {
    Literal(String),
    Variable(VariableRef),
    TaskRef(TaskReference),
}

// --- TASK MODEL ---

/// A parameter a task declares, with an optional default and type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub desc: Option<String>,
}

/// A fully parsed task definition. Pure data; resolution happens elsewhere.
#[derive(Debug, Clone)]
pub struct Task {
    /// Short name as written in the manifest.
    pub name: String,
    /// `namespace::name`, unique across the workspace.
    pub qualified_name: String,
    /// File namespace, derived from the manifest file name.
    pub namespace: String,
    pub file: PathBuf,
    pub desc: Option<String>,
    /// The command template as written.
    pub raw_command: String,
    pub template: Vec<TemplateComponent>,
    pub params: Vec<ParamDef>,
    /// Declared `deps = [...]` entries, in order, duplicates removed.
    pub deps: Vec<TaskReference>,
    /// Span of the task's table in the manifest.
    pub span: Span,
    /// Span of the `run` string value.
    pub command_span: Span,
}

impl Task {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    /// All variable placeholders in the command template, in order.
    pub fn variables(&self) -> impl Iterator<Item = &VariableRef> {
        self.template.iter().filter_map(|c| match c {
            TemplateComponent::Variable(v) => Some(v),
            _ => None,
        })
    }

    /// Every task reference this task makes: declared `deps` entries first,
    /// then `{task::...}` placeholders in template order.
    pub fn references(&self) -> impl Iterator<Item = &TaskReference> {
        self.deps
            .iter()
            .chain(self.template.iter().filter_map(|c| match c {
                TemplateComponent::TaskRef(r) => Some(r),
                _ => None,
            }))
    }
}

// --- EDITOR-FACING SYMBOL DATA ---

/// What kind of symbol a completion item names.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Variable,
    Task,
}

/// Plain structured completion data; the editor transport layer is
/// responsible for rendering protocol-specific payloads from it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
}

/// Result of a positional variable lookup: the placeholder's name plus the
/// innermost statically visible scope that binds it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableHit {
    pub name: String,
    pub origin: Option<VariableOrigin>,
}

/// Where a variable binding was found during a positional lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableOrigin {
    pub scope: crate::core::scope::ScopeKind,
    /// Human-readable label of the binding site (task or file name).
    pub label: String,
}

/// Caller-supplied variable overrides. These take precedence over every
/// declared scope during resolution.
pub type Overrides = HashMap<String, Value>;
