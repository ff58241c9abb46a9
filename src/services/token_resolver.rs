//! Placeholder token substitution.
//!
//! Tokens are `<%expr%>` spans whose inner expression contains neither `%`
//! nor `>`. An expression is a plain lookup: an identifier or a dotted path
//! into the bindings, optionally prefixed with `this.`. Nothing is evaluated.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn token_pattern() -> &'static Regex {
    TOKEN_PATTERN.get_or_init(|| Regex::new(r"<%([^%>]*)%>").expect("token pattern is valid"))
}

/// Substitute every token in `text` with its binding.
///
/// Literal text (newlines included) is copied unchanged. Tokens whose path is
/// absent, or bound to null, resolve to the empty string. An unterminated
/// `<%` is plain text.
pub fn resolve(text: &str, bindings: &Map<String, Value>) -> String {
    let pattern = token_pattern();
    if !pattern.is_match(text) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for caps in pattern.captures_iter(text) {
        let (Some(span), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[cursor..span.start()]);
        if let Some(value) = lookup(bindings, expr.as_str()) {
            push_value(&mut out, value);
        }
        cursor = span.end();
    }
    out.push_str(&text[cursor..]);
    out
}

/// Follow an identifier or dotted path through nested objects and arrays.
pub fn lookup<'a>(bindings: &'a Map<String, Value>, expr: &str) -> Option<&'a Value> {
    let expr = expr.trim();
    let path = expr.strip_prefix("this.").unwrap_or(expr);
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.').map(str::trim);
    let mut current = bindings.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        composite => out.push_str(&composite.to_string()),
    }
}
