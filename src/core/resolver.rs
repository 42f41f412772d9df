// src/core/resolver.rs

//! Variable resolution and command expansion.
//!
//! For each variable placeholder in a task's template the resolver looks the
//! name up through caller overrides, then the scope chain innermost-first,
//! then the placeholder's inline default. All failures for one task are
//! collected into a single report so a user or editor sees every undefined
//! variable in one pass. Resolution is deterministic and side-effect free.

use crate::core::diagnostics::ResolutionError;
use crate::core::scope::ScopeChain;
use crate::models::{Overrides, Task, TemplateComponent, Value, ValueKind};
use std::collections::HashMap;

/// Final variable bindings for one task, keyed by placeholder name.
pub type Bindings = HashMap<String, Value>;

/// Resolves every variable placeholder of `task`. Overrides take precedence
/// over all declared scopes regardless of their ordering.
pub fn resolve_variables(
    task: &Task,
    chain: &ScopeChain,
    overrides: &Overrides,
) -> Result<Bindings, Vec<ResolutionError>> {
    let mut bindings = Bindings::new();
    let mut errors = Vec::new();

    for var in task.variables() {
        if bindings.contains_key(&var.name) {
            continue;
        }

        let found = overrides
            .get(&var.name)
            .cloned()
            .or_else(|| chain.lookup(&var.name).map(|(v, _)| v.clone()))
            .or_else(|| var.default.clone().map(Value::String));

        let Some(value) = found else {
            errors.push(ResolutionError::UndefinedVariable {
                name: var.name.clone(),
                span: var.span,
            });
            continue;
        };

        // Expected type: the placeholder hint wins, else the declared param.
        let expected = var
            .hint
            .or_else(|| task.param(&var.name).map(|p| p.kind))
            .unwrap_or(ValueKind::String);

        match value.coerce(expected) {
            Ok(coerced) => {
                bindings.insert(var.name.clone(), coerced);
            }
            Err(()) => errors.push(ResolutionError::TypeMismatch {
                name: var.name.clone(),
                expected,
                actual: value.render(),
                span: var.span,
            }),
        }
    }

    if errors.is_empty() { Ok(bindings) } else { Err(errors) }
}

/// Substitutes resolved bindings into the task's template, producing the
/// final command string. Task-reference placeholders are replaced through
/// `inlined`, keyed by target-as-written; the engine fills that map from the
/// already-expanded commands of referenced tasks (safe on a validated,
/// acyclic graph). A template with no placeholders comes back unchanged.
pub fn expand_command(
    task: &Task,
    bindings: &Bindings,
    inlined: &HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(task.raw_command.len());
    for component in &task.template {
        match component {
            TemplateComponent::Literal(s) => out.push_str(s),
            TemplateComponent::Variable(var) => match bindings.get(&var.name) {
                Some(value) => out.push_str(&value.render()),
                // Unresolved names only survive here on the preview path;
                // the token is kept verbatim so the gap stays visible.
                None => out.push_str(&format!("{{{}}}", var.name)),
            },
            TemplateComponent::TaskRef(r) => match inlined.get(&r.target) {
                Some(command) => out.push_str(command),
                None => out.push_str(&format!("{{task::{}}}", r.target)),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest;
    use crate::core::scope::{Scope, ScopeKind};
    use std::path::PathBuf;

    fn task_from(toml: &str, name: &str) -> Task {
        let parsed = manifest::parse_manifest(&PathBuf::from("ci.tasks.toml"), toml);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        parsed
            .tasks
            .into_iter()
            .find(|t| t.name == name)
            .expect("task not found")
    }

    fn chain_with(kind: ScopeKind, pairs: &[(&str, Value)]) -> ScopeChain {
        let mut chain = ScopeChain::new();
        chain.push(Scope::new(
            kind,
            "test",
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ));
        chain
    }

    #[test]
    fn test_placeholder_free_template_unchanged() {
        let task = task_from("[tasks.a]\nrun = \"cargo build --release\"\n", "a");
        let bindings = resolve_variables(&task, &ScopeChain::new(), &Overrides::new())
            .expect("no placeholders to resolve");
        assert!(bindings.is_empty());
        let cmd = expand_command(&task, &bindings, &HashMap::new());
        assert_eq!(cmd, "cargo build --release");
    }

    #[test]
    fn test_param_default_resolves_and_expands() {
        let task = task_from(
            "[tasks.build]\nrun = \"compile {target}\"\n[tasks.build.params.target]\ndefault = \"release\"\n",
            "build",
        );
        let mut chain = ScopeChain::new();
        chain.push(Scope::new(
            ScopeKind::Task,
            "ci::build",
            [("target".to_string(), Value::String("release".into()))].into(),
        ));
        let bindings = resolve_variables(&task, &chain, &Overrides::new()).expect("resolves");
        assert_eq!(
            expand_command(&task, &bindings, &HashMap::new()),
            "compile release"
        );
    }

    #[test]
    fn test_override_beats_scope_chain() {
        let task = task_from("[tasks.a]\nrun = \"echo {who}\"\n", "a");
        let chain = chain_with(ScopeKind::File, &[("who", Value::String("scope".into()))]);
        let mut overrides = Overrides::new();
        overrides.insert("who".into(), Value::String("override".into()));
        let bindings = resolve_variables(&task, &chain, &overrides).expect("resolves");
        assert_eq!(bindings.get("who"), Some(&Value::String("override".into())));
    }

    #[test]
    fn test_inline_default_is_last_resort() {
        let task = task_from("[tasks.a]\nrun = \"echo {tag:-latest}\"\n", "a");
        let bindings =
            resolve_variables(&task, &ScopeChain::new(), &Overrides::new()).expect("resolves");
        assert_eq!(
            expand_command(&task, &bindings, &HashMap::new()),
            "echo latest"
        );

        // A scope binding still beats the inline default.
        let chain = chain_with(ScopeKind::File, &[("tag", Value::String("v2".into()))]);
        let bindings = resolve_variables(&task, &chain, &Overrides::new()).expect("resolves");
        assert_eq!(expand_command(&task, &bindings, &HashMap::new()), "echo v2");
    }

    #[test]
    fn test_undefined_variable_collected_not_expanded() {
        let task = task_from("[tasks.a]\nrun = \"echo {missing}\"\n", "a");
        let errors = resolve_variables(&task, &ScopeChain::new(), &Overrides::new())
            .expect_err("must fail");
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ResolutionError::UndefinedVariable { name, span } => {
                assert_eq!(name, "missing");
                assert_ne!(span.end, span.start);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_all_failures_reported_in_one_pass() {
        let task = task_from("[tasks.a]\nrun = \"{one} {two} {three:-x}\"\n", "a");
        let errors = resolve_variables(&task, &ScopeChain::new(), &Overrides::new())
            .expect_err("must fail");
        // `three` has an inline default; only the other two are undefined.
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_type_hint_validates_convertibility() {
        let task = task_from("[tasks.a]\nrun = \"serve {port:number}\"\n", "a");

        let chain = chain_with(ScopeKind::File, &[("port", Value::String("8080".into()))]);
        let bindings = resolve_variables(&task, &chain, &Overrides::new()).expect("converts");
        assert_eq!(bindings.get("port"), Some(&Value::Number(8080.0)));

        let chain = chain_with(ScopeKind::File, &[("port", Value::String("http".into()))]);
        let errors = resolve_variables(&task, &chain, &Overrides::new()).expect_err("must fail");
        assert!(matches!(
            &errors[0],
            ResolutionError::TypeMismatch { name, expected, .. }
                if name == "port" && *expected == ValueKind::Number
        ));
    }

    #[test]
    fn test_declared_param_type_checked_without_hint() {
        let task = task_from(
            "[tasks.a]\nrun = \"retry {count}\"\n[tasks.a.params.count]\ntype = \"number\"\n",
            "a",
        );
        let mut overrides = Overrides::new();
        overrides.insert("count".into(), Value::String("not-a-number".into()));
        let errors = resolve_variables(&task, &ScopeChain::new(), &overrides).expect_err("fails");
        assert!(matches!(errors[0], ResolutionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_list_value_renders_space_joined() {
        let task = task_from("[tasks.a]\nrun = \"lint {files:list}\"\n", "a");
        let chain = chain_with(
            ScopeKind::File,
            &[("files", Value::List(vec!["a.rs".into(), "b.rs".into()]))],
        );
        let bindings = resolve_variables(&task, &chain, &Overrides::new()).expect("resolves");
        assert_eq!(
            expand_command(&task, &bindings, &HashMap::new()),
            "lint a.rs b.rs"
        );
    }
}
