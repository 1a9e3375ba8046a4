//! Dockerfile template rendering.
//!
//! Placeholders are written `{{ key }}` and expand to the plain-string form
//! of the value `lookup` returns for `key`. Dotted keys (`versions.ruby`)
//! descend into mappings. `{{ key | json }}` renders the value as JSON,
//! which suits exec-form instructions:
//!
//! ```text
//! FROM {{ from }}
//! RUN apk add --no-cache {{ packages }}
//! ENTRYPOINT {{ entrypoint | json }}
//! ```
//!
//! A backslash before `{{` emits the braces literally.

use crate::error::{Error, Result};
use crate::metadata::Value;
use regex::Regex;
use std::sync::LazyLock;

static EXPRESSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_-]+)*)\s*(?:\|\s*([a-z]+)\s*)?$")
        .expect("template expression regex must compile")
});

/// Render `source`, resolving placeholders through `lookup`.
///
/// `name` identifies the template in error messages.
pub fn render(name: &str, source: &str, lookup: &dyn Fn(&str) -> Value) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if rest[..start].ends_with('\\') {
            out.push_str(&rest[..start - 1]);
            out.push_str("{{");
            rest = &rest[start + 2..];
            continue;
        }

        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            let offset = source.len() - rest.len() + start;
            return Err(template_error(name, source, offset, "unterminated placeholder"));
        };

        let expression = &after[..end];
        out.push_str(&expand(name, expression, lookup)?);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn expand(name: &str, expression: &str, lookup: &dyn Fn(&str) -> Value) -> Result<String> {
    let caps = EXPRESSION_REGEX
        .captures(expression)
        .ok_or_else(|| Error::TemplateError {
            template: name.to_string(),
            message: format!("invalid placeholder '{{{{{expression}}}}}'"),
        })?;

    let path = &caps[1];
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or(path);
    let mut value = lookup(first);
    for segment in segments {
        value = value.get(segment).cloned().unwrap_or_default();
    }

    match caps.get(2).map(|m| m.as_str()) {
        None => Ok(value.to_plain_string()),
        Some("json") => serde_json::to_string(&value).map_err(|e| Error::TemplateError {
            template: name.to_string(),
            message: e.to_string(),
        }),
        Some(filter) => Err(Error::TemplateError {
            template: name.to_string(),
            message: format!("unknown filter '{filter}'"),
        }),
    }
}

fn template_error(name: &str, source: &str, offset: usize, message: &str) -> Error {
    let line = source[..offset].matches('\n').count() + 1;
    Error::TemplateError {
        template: name.to_string(),
        message: format!("{message} on line {line}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Map;

    fn lookup(key: &str) -> Value {
        match key {
            "from" => Value::from("alpine:3.19"),
            "packages" => Value::from(vec![Value::from("curl"), Value::from("git")]),
            "entrypoint" => Value::from(vec![Value::from("/bin/sh"), Value::from("-c")]),
            "versions" => {
                let mut map = Map::new();
                map.insert("ruby".into(), Value::from("3.3"));
                Value::from(map)
            }
            _ => Value::Nil,
        }
    }

    #[test]
    fn renders_scalars_and_lists() {
        let out = render(
            "Dockerfile",
            "FROM {{ from }}\nRUN apk add {{packages}}\n",
            &lookup,
        )
        .unwrap();
        assert_eq!(out, "FROM alpine:3.19\nRUN apk add curl git\n");
    }

    #[test]
    fn json_filter() {
        let out = render("Dockerfile", "ENTRYPOINT {{ entrypoint | json }}", &lookup).unwrap();
        assert_eq!(out, r#"ENTRYPOINT ["/bin/sh","-c"]"#);
    }

    #[test]
    fn dotted_keys_descend() {
        let out = render("Dockerfile", "ARG RUBY={{ versions.ruby }}", &lookup).unwrap();
        assert_eq!(out, "ARG RUBY=3.3");
    }

    #[test]
    fn nil_renders_empty() {
        let out = render("Dockerfile", "[{{ missing }}]", &lookup).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let out = render("Dockerfile", r"RUN echo \{{ from }}", &lookup).unwrap();
        assert_eq!(out, "RUN echo {{ from }}");
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let err = render("Dockerfile", "FROM x\nRUN {{ from", &lookup).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unterminated"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn unterminated_placeholder_after_others_reports_its_line() {
        let err = render("Dockerfile", "FROM {{ from }}\nRUN x\nRUN {{ oops", &lookup).unwrap_err();
        assert!(err.to_string().contains("line 3"));

        let err = render("Dockerfile", "LABEL a=é{{ from }}012345678{{ oops", &lookup).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn unknown_filter_is_an_error() {
        assert!(render("Dockerfile", "{{ from | upper }}", &lookup).is_err());
    }

    #[test]
    fn invalid_expression_is_an_error() {
        assert!(render("Dockerfile", "{{ 1 + 2 }}", &lookup).is_err());
    }
}
