//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Block-style YAML emitter that re-attaches comments by key path.
//!
//! Scalars are formatted by `serde_yaml` so quoting rules stay identical to
//! the parser; only the layout of mappings and sequences is done here. A null
//! value renders as a bare `key:` to match hand-written manifests.

use serde_yaml::{Mapping, Value};

use crate::comments::CommentMap;
use crate::path::{scalar_to_string, KeyPath};

pub(crate) fn render_document(root: &Value, comments: &CommentMap) -> serde_yaml::Result<String> {
    let mut out = String::new();
    match root {
        Value::Mapping(map) if !map.is_empty() => {
            render_mapping(&mut out, map, &mut Vec::new(), 0, Some(comments))?;
        }
        Value::Null => {}
        other => out.push_str(&serde_yaml::to_string(other)?),
    }
    for line in comments.footer() {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

fn render_mapping(
    out: &mut String,
    map: &Mapping,
    path: &mut KeyPath,
    indent: usize,
    comments: Option<&CommentMap>,
) -> serde_yaml::Result<()> {
    let pad = " ".repeat(indent);
    for (key, value) in map {
        path.push(scalar_to_string(key).unwrap_or_default());
        let comment = comments.and_then(|c| c.get(path));

        if let Some(comment) = comment {
            for line in &comment.leading {
                if !line.is_empty() {
                    out.push_str(&pad);
                    out.push_str(line);
                }
                out.push('\n');
            }
        }
        let inline = comment
            .and_then(|c| c.inline.as_deref())
            .map(|text| format!(" # {text}"))
            .unwrap_or_default();

        out.push_str(&pad);
        out.push_str(serde_yaml::to_string(key)?.trim_end());
        out.push(':');
        match value {
            Value::Mapping(child) if !child.is_empty() => {
                out.push_str(&inline);
                out.push('\n');
                render_mapping(out, child, path, indent + 2, comments)?;
            }
            Value::Sequence(items) if !items.is_empty() => {
                out.push_str(&inline);
                out.push('\n');
                render_sequence(out, items, indent + 2)?;
            }
            Value::Null => {
                out.push_str(&inline);
                out.push('\n');
            }
            scalar => {
                out.push(' ');
                push_scalar(out, scalar, &pad, &inline)?;
            }
        }
        path.pop();
    }
    Ok(())
}

fn render_sequence(out: &mut String, items: &[Value], indent: usize) -> serde_yaml::Result<()> {
    let pad = " ".repeat(indent);
    for item in items {
        let mut nested = String::new();
        match item {
            Value::Mapping(map) if !map.is_empty() => {
                render_mapping(&mut nested, map, &mut Vec::new(), indent + 2, None)?;
            }
            Value::Sequence(inner) if !inner.is_empty() => {
                render_sequence(&mut nested, inner, indent + 2)?;
            }
            scalar => {
                out.push_str(&pad);
                out.push_str("- ");
                push_scalar(out, scalar, &pad, "")?;
                continue;
            }
        }
        // The first nested line starts at `indent + 2`; fold it onto the dash.
        out.push_str(&pad);
        out.push_str("- ");
        out.push_str(&nested[indent + 2..]);
    }
    Ok(())
}

/// Append a scalar, then the inline comment, then a newline. Continuation
/// lines of block scalars are shifted under the owning key.
fn push_scalar(out: &mut String, value: &Value, pad: &str, inline: &str) -> serde_yaml::Result<()> {
    let text = serde_yaml::to_string(value)?;
    let mut lines = text.trim_end_matches('\n').lines();
    out.push_str(lines.next().unwrap_or_default());
    out.push_str(inline);
    out.push('\n');
    for line in lines {
        if !line.is_empty() {
            out.push_str(pad);
            out.push_str(line);
        }
        out.push('\n');
    }
    Ok(())
}
