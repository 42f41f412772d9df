// src/core/manifest.rs

//! Manifest compilation: turns the text of one `*.tasks.toml` file into
//! parsed [`Task`] definitions plus collected parse errors.
//!
//! This never fails outright. A file whose TOML is invalid still produces a
//! (task-less) result carrying an `invalid-manifest` diagnostic, so the
//! editor integration can re-parse on every keystroke without surfacing an
//! unhandled failure mid-edit.

use crate::constants::MANIFEST_SUFFIX;
use crate::core::diagnostics::ParseError;
use crate::core::template;
use crate::models::{ParamDef, Span, Task, TaskReference, Value, ValueKind};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use toml::Spanned;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap();
    static ref HEADER_RE: Regex = Regex::new(r"(?m)^[ \t]*\[([^\]\n]+)\]").unwrap();
}

// --- TOML SCHEMA ---

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ManifestToml {
    #[serde(default)]
    vars: HashMap<String, Value>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskToml>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TaskToml {
    #[serde(default)]
    desc: Option<String>,
    run: Spanned<String>,
    #[serde(default)]
    deps: Vec<Spanned<String>>,
    #[serde(default)]
    params: BTreeMap<String, ParamToml>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ParamToml {
    #[serde(default)]
    default: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<ValueKind>,
    #[serde(default)]
    desc: Option<String>,
}

// --- RESULT ---

/// Everything extracted from one manifest file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub namespace: String,
    pub vars: HashMap<String, Value>,
    pub tasks: Vec<Task>,
    pub errors: Vec<ParseError>,
}

/// Derives a file's namespace from its name: `ci.tasks.toml` -> `ci`.
pub fn namespace_of(path: &Path) -> String {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    match file_name {
        Some(name) => name
            .strip_suffix(MANIFEST_SUFFIX)
            .map(str::to_string)
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }),
        None => String::new(),
    }
}

/// Parses one manifest. Tasks come back sorted by name; every symbol carries
/// its byte span into `text`.
pub fn parse_manifest(path: &Path, text: &str) -> ParsedFile {
    let namespace = namespace_of(path);
    let mut parsed = ParsedFile {
        namespace: namespace.clone(),
        ..Default::default()
    };

    let manifest: ManifestToml = match toml::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let span = e
                .span()
                .map(|r| Span::new(r.start, r.end))
                .unwrap_or_default();
            parsed.errors.push(ParseError::Manifest {
                message: e.message().to_string(),
                span,
            });
            return parsed;
        }
    };

    parsed.vars = manifest.vars;

    let headers = table_headers(text);
    for (name, task_toml) in manifest.tasks {
        let task_span = task_table_span(&headers, &name, text.len());

        if !NAME_RE.is_match(&name) {
            parsed.errors.push(ParseError::Manifest {
                message: format!("invalid task name '{}'", name),
                span: task_span,
            });
            continue;
        }

        let run_range = task_toml.run.span();
        let raw_command = task_toml.run.into_inner();
        let command_span = Span::new(run_range.start, run_range.end);

        // Rebase template spans onto the file by locating the string's
        // content inside the spanned `run` value (skips the quotes).
        let template_base = text
            .get(run_range.clone())
            .and_then(|region| region.find(raw_command.as_str()))
            .map_or(run_range.start, |off| run_range.start + off);

        let (mut components, template_errors) = template::parse_template(&raw_command);
        for component in &mut components {
            match component {
                crate::models::TemplateComponent::Variable(v) => {
                    v.span = v.span.rebase(template_base);
                }
                crate::models::TemplateComponent::TaskRef(r) => {
                    r.span = r.span.rebase(template_base);
                }
                crate::models::TemplateComponent::Literal(_) => {}
            }
        }
        parsed
            .errors
            .extend(template_errors.into_iter().map(|e| rebase_error(e, template_base)));

        let mut deps = Vec::new();
        let mut seen = HashSet::new();
        for dep in task_toml.deps {
            let range = dep.span();
            let target = dep.into_inner();
            let span = Span::new(range.start, range.end);
            if !seen.insert(target.clone()) {
                parsed
                    .errors
                    .push(ParseError::DuplicateDependency { target, span });
                continue;
            }
            deps.push(TaskReference { target, span });
        }

        let mut params = Vec::new();
        for (param_name, param) in task_toml.params {
            let kind = param
                .kind
                .or_else(|| param.default.as_ref().map(Value::kind))
                .unwrap_or(ValueKind::String);
            if let Some(default) = &param.default {
                if default.coerce(kind).is_err() {
                    parsed.errors.push(ParseError::Manifest {
                        message: format!(
                            "default for param '{}' of task '{}' is not a valid {}",
                            param_name, name, kind
                        ),
                        span: task_span,
                    });
                }
            }
            params.push(ParamDef {
                name: param_name,
                kind,
                default: param.default,
                desc: param.desc,
            });
        }

        parsed.tasks.push(Task {
            qualified_name: format!("{}::{}", namespace, name),
            name,
            namespace: namespace.clone(),
            file: path.to_path_buf(),
            desc: task_toml.desc,
            raw_command,
            template: components,
            params,
            deps,
            span: task_span,
            command_span,
        });
    }

    parsed
}

fn rebase_error(err: ParseError, base: usize) -> ParseError {
    match err {
        ParseError::MalformedPlaceholder { text, span } => ParseError::MalformedPlaceholder {
            text,
            span: span.rebase(base),
        },
        ParseError::AmbiguousToken { text, span } => ParseError::AmbiguousToken {
            text,
            span: span.rebase(base),
        },
        other => other,
    }
}

/// Offsets and names of every `[...]` table header in the file.
fn table_headers(text: &str) -> Vec<(usize, String)> {
    HEADER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let name = caps.get(1)?.as_str().trim().to_string();
            Some((m.start(), name))
        })
        .collect()
}

/// The span of `[tasks.<name>]` plus all of its sub-tables.
fn task_table_span(headers: &[(usize, String)], name: &str, text_len: usize) -> Span {
    let own = format!("tasks.{}", name);
    let sub_prefix = format!("{}.", own);
    let start = headers
        .iter()
        .find(|(_, h)| *h == own)
        .map(|(off, _)| *off);
    match start {
        Some(start) => {
            let end = headers
                .iter()
                .filter(|(off, _)| *off > start)
                .find(|(_, h)| *h != own && !h.starts_with(&sub_prefix))
                .map_or(text_len, |(off, _)| *off);
            Span::new(start, end)
        }
        None => Span::default(),
    }
}
