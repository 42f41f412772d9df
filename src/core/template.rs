// src/core/template.rs

//! Command-template tokenizer.
//!
//! Splits a raw command string into literal text, variable placeholders and
//! task-reference placeholders. Parsing never fails outright: a malformed or
//! ambiguous token becomes a [`ParseError`] and the token's text is kept as
//! opaque literal content, so one typo does not prevent indexing the rest of
//! the file.
//!
//! Syntax:
//! - `{name}` variable, `{name:number}` typed, `{name:-fallback}` with an
//!   inline default (`{name:number:-3}` combined);
//! - `{task::build}` task reference, optionally qualified `{task::ci::build}`;
//! - `{{` and `}}` escape literal braces.

use crate::constants::TASK_SIGIL;
use crate::core::diagnostics::ParseError;
use crate::models::{Span, TaskReference, TemplateComponent, VariableRef};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VARIABLE_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)(?::(string|number|bool|list))?(?::-(.*))?$")
            .unwrap();
    static ref TASK_TARGET_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(?:::[A-Za-z_][A-Za-z0-9_-]*)?$").unwrap();
}

/// How a placeholder scan ended: at a closing brace, or at an offset where
/// the token can no longer continue (next `{` or end of input).
enum ScanEnd {
    Closed(usize),
    Stopped(usize),
}

/// Tokenizes a command template. Spans are byte offsets into `text`; callers
/// indexing a whole file rebase them onto the file afterwards.
pub fn parse_template(text: &str) -> (Vec<TemplateComponent>, Vec<ParseError>) {
    let mut components: Vec<TemplateComponent> = Vec::new();
    let mut errors = Vec::new();

    // Adjacent literals are merged so placeholder-free templates come back
    // as a single unchanged segment.
    let push_literal = |components: &mut Vec<TemplateComponent>, s: &str| {
        if s.is_empty() {
            return;
        }
        if let Some(TemplateComponent::Literal(last)) = components.last_mut() {
            last.push_str(s);
        } else {
            components.push(TemplateComponent::Literal(s.to_string()));
        }
    };

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                push_literal(&mut components, "{");
                i += 2;
            }
            b'{' => match scan_for_close(bytes, i + 1) {
                ScanEnd::Closed(j) => {
                    let content = &text[i + 1..j];
                    let span = Span::new(i, j + 1);
                    match classify_token(content, span) {
                        Ok(component) => components.push(component),
                        Err(e) => {
                            errors.push(e);
                            push_literal(&mut components, &text[i..j + 1]);
                        }
                    }
                    i = j + 1;
                }
                ScanEnd::Stopped(k) => {
                    errors.push(ParseError::MalformedPlaceholder {
                        text: text[i..k].to_string(),
                        span: Span::new(i, k),
                    });
                    push_literal(&mut components, &text[i..k]);
                    i = k;
                }
            },
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                push_literal(&mut components, "}");
                i += 2;
            }
            b'}' => {
                errors.push(ParseError::MalformedPlaceholder {
                    text: "}".to_string(),
                    span: Span::new(i, i + 1),
                });
                push_literal(&mut components, "}");
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'{' && bytes[i] != b'}' {
                    i += 1;
                }
                push_literal(&mut components, &text[start..i]);
            }
        }
    }

    (components, errors)
}

fn scan_for_close(bytes: &[u8], from: usize) -> ScanEnd {
    let mut k = from;
    while k < bytes.len() {
        match bytes[k] {
            b'}' => return ScanEnd::Closed(k),
            b'{' => return ScanEnd::Stopped(k),
            _ => k += 1,
        }
    }
    ScanEnd::Stopped(bytes.len())
}

/// Decides, once, whether token content is a variable or a task reference.
/// Content matching neither grammar cleanly is an ambiguous token.
fn classify_token(content: &str, span: Span) -> Result<TemplateComponent, ParseError> {
    if let Some(target) = content.strip_prefix(TASK_SIGIL) {
        if TASK_TARGET_RE.is_match(target) {
            return Ok(TemplateComponent::TaskRef(TaskReference {
                target: target.to_string(),
                span,
            }));
        }
        return Err(ParseError::AmbiguousToken {
            text: content.to_string(),
            span,
        });
    }

    if let Some(caps) = VARIABLE_RE.captures(content) {
        let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let hint = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let default = caps.get(3).map(|m| m.as_str().to_string());
        return Ok(TemplateComponent::Variable(VariableRef {
            name,
            hint,
            default,
            span,
        }));
    }

    Err(ParseError::AmbiguousToken {
        text: content.to_string(),
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValueKind;

    fn variables(components: &[TemplateComponent]) -> Vec<&VariableRef> {
        components
            .iter()
            .filter_map(|c| match c {
                TemplateComponent::Variable(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text_is_one_literal() {
        let (components, errors) = parse_template("cargo build --release");
        assert!(errors.is_empty());
        assert_eq!(
            components,
            vec![TemplateComponent::Literal("cargo build --release".into())]
        );
    }

    #[test]
    fn test_variable_with_span() {
        let (components, errors) = parse_template("compile {target}");
        assert!(errors.is_empty());
        assert_eq!(components.len(), 2);
        let vars = variables(&components);
        assert_eq!(vars[0].name, "target");
        assert_eq!(vars[0].span, Span::new(8, 16));
        assert!(vars[0].hint.is_none());
        assert!(vars[0].default.is_none());
    }

    #[test]
    fn test_variable_with_hint_and_default() {
        let (components, errors) = parse_template("serve --port {port:number:-8080}");
        assert!(errors.is_empty());
        let vars = variables(&components);
        assert_eq!(vars[0].name, "port");
        assert_eq!(vars[0].hint, Some(ValueKind::Number));
        assert_eq!(vars[0].default.as_deref(), Some("8080"));
    }

    #[test]
    fn test_task_reference_plain_and_qualified() {
        let (components, errors) = parse_template("{task::build} && {task::ci::deploy}");
        assert!(errors.is_empty());
        match (&components[0], &components[2]) {
            (TemplateComponent::TaskRef(a), TemplateComponent::TaskRef(b)) => {
                assert_eq!(a.target, "build");
                assert_eq!(b.target, "ci::deploy");
            }
            other => panic!("unexpected components: {:?}", other),
        }
    }

    #[test]
    fn test_escaped_braces_become_literals() {
        let (components, errors) = parse_template("echo '{{literal}}' {x}");
        assert!(errors.is_empty());
        assert_eq!(
            components[0],
            TemplateComponent::Literal("echo '{literal}' ".into())
        );
        assert!(matches!(components[1], TemplateComponent::Variable(_)));
    }

    #[test]
    fn test_unterminated_placeholder_is_malformed_but_parsing_continues() {
        let (components, errors) = parse_template("run {oops {target}");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::MalformedPlaceholder { .. }
        ));
        // The valid token after the malformed one is still recognized.
        let vars = variables(&components);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "target");
    }

    #[test]
    fn test_ambiguous_token_kept_as_literal() {
        let (components, errors) = parse_template("echo {not a token}");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::AmbiguousToken { .. }));
        assert_eq!(
            components,
            vec![TemplateComponent::Literal("echo {not a token}".into())]
        );
    }

    #[test]
    fn test_empty_braces_are_ambiguous() {
        let (_, errors) = parse_template("echo {}");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::AmbiguousToken { .. }));
    }

    #[test]
    fn test_bad_type_hint_is_ambiguous() {
        let (_, errors) = parse_template("{count:float}");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::AmbiguousToken { .. }));
    }

    #[test]
    fn test_bad_task_target_is_ambiguous() {
        let (_, errors) = parse_template("{task::a::b::c}");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::AmbiguousToken { .. }));
    }

    #[test]
    fn test_stray_close_brace_reported() {
        let (components, errors) = parse_template("fn main() }");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            components,
            vec![TemplateComponent::Literal("fn main() }".into())]
        );
    }
}
