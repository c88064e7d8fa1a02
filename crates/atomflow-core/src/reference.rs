//! The `{{ ref: NODE.FIELD }}` reference micro-language.
//!
//! Plan inputs may defer a value to another node's output instead of writing
//! a literal. The placeholder shows up in two places with different needs:
//! the interface type-checker must skip deferred values, and the compiler
//! must rewrite them into the target engine's expression syntax. Both go
//! through this module; the pattern is defined exactly once.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*ref:\s*([^}]+?)\s*\}\}").expect("ref pattern is valid"));

/// A parsed reference: the source node id and the output field it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub node: String,
    pub field: String,
}

/// True when a plan input value is a deferred expression.
///
/// Any string beginning with `{{` qualifies; type and enum checks are
/// skipped for such values since they resolve at compile time.
pub fn is_expression(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::String(s) if s.starts_with("{{"))
}

/// Find the first `{{ ref: ... }}` placeholder in `text`.
///
/// Returns the byte range of the whole placeholder and the parsed reference.
/// `FIELD` defaults to `body` when the reference names only a node; a dotted
/// tail (`node.a.b`) keeps everything after the first dot as the field.
pub fn find_ref(text: &str) -> Option<(Range<usize>, NodeRef)> {
    let captures = REF_PATTERN.captures(text)?;
    let whole = captures.get(0)?;
    let body = captures.get(1)?.as_str().trim();
    let (node, field) = match body.split_once('.') {
        Some((node, field)) if !field.trim().is_empty() => (node.trim(), field.trim()),
        _ => (body, "body"),
    };
    Some((
        whole.range(),
        NodeRef {
            node: node.to_string(),
            field: field.to_string(),
        },
    ))
}

/// Rewrite the first reference placeholder in `text` into the n8n expression
/// that reads the named node's JSON output. Text without a resolvable
/// placeholder is returned unchanged.
pub fn rewrite(text: &str) -> String {
    match find_ref(text) {
        Some((range, r)) => {
            let expression = format!("$('{{{{ $node[\"{}\"].json.{} }}}}')", r.node, r.field);
            let mut out = String::with_capacity(text.len() + expression.len());
            out.push_str(&text[..range.start]);
            out.push_str(&expression);
            out.push_str(&text[range.end..]);
            out
        }
        None => text.to_string(),
    }
}
