//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Comment side channel.
//!
//! `serde_yaml` drops comments, so they are lifted out of the source text by a
//! line scanner and re-attached by key path when the document is rendered.
//! Only mapping keys carry comments; comments inside block sequences and
//! block scalars are not tracked.

use std::collections::BTreeMap;

use crate::path::KeyPath;

/// Comments attached to a single mapping key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
    /// Full-line comments (`# ...`) and blank lines (`""`) directly above the
    /// key, without indentation.
    pub leading: Vec<String>,
    /// Text of the trailing `# ...` on the key line, without the marker.
    pub inline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentMap {
    entries: BTreeMap<KeyPath, Comment>,
    footer: Vec<String>,
}

fn has_prefix<S: AsRef<str>>(path: &[String], prefix: &[S]) -> bool {
    path.len() >= prefix.len()
        && path
            .iter()
            .zip(prefix)
            .all(|(segment, expected)| segment == expected.as_ref())
}

fn owned<S: AsRef<str>>(segments: &[S]) -> KeyPath {
    segments.iter().map(|s| s.as_ref().to_owned()).collect()
}

impl CommentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan YAML source text and collect comments by key path.
    pub fn parse(text: &str) -> Self {
        let mut map = Self::default();
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        // Lines indented deeper than this belong to a sequence item or a block
        // scalar and are not scanned for keys.
        let mut opaque_above: Option<usize> = None;

        for line in text.lines() {
            let trimmed = line.trim_start();
            let indent = line.len() - trimmed.len();

            if let Some(floor) = opaque_above {
                if trimmed.is_empty() || indent > floor {
                    continue;
                }
                opaque_above = None;
            }

            if trimmed.is_empty() {
                pending.push(String::new());
                continue;
            }
            if trimmed.starts_with('#') {
                pending.push(trimmed.trim_end().to_owned());
                continue;
            }
            if trimmed == "---" || trimmed == "..." || trimmed.starts_with('%') {
                pending.clear();
                continue;
            }
            if trimmed == "-" || trimmed.starts_with("- ") {
                pending.clear();
                opaque_above = Some(indent);
                continue;
            }

            let Some((key, rest)) = split_key(trimmed) else {
                pending.clear();
                continue;
            };

            while stack.last().is_some_and(|(depth, _)| *depth >= indent) {
                stack.pop();
            }
            let mut path: KeyPath = stack.iter().map(|(_, k)| k.clone()).collect();
            path.push(key.clone());

            let (value, inline) = split_inline_comment(rest);
            if !pending.is_empty() || inline.is_some() {
                map.entries.insert(
                    path,
                    Comment {
                        leading: std::mem::take(&mut pending),
                        inline,
                    },
                );
            }
            let value = value.trim();
            if value.starts_with('|') || value.starts_with('>') {
                opaque_above = Some(indent);
            }
            stack.push((indent, key));
        }

        while pending.last().is_some_and(String::is_empty) {
            pending.pop();
        }
        map.footer = pending;
        map
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Comment> {
        self.entries.get(&owned(path))
    }

    pub fn leading<S: AsRef<str>>(&self, path: &[S]) -> &[String] {
        self.get(path).map(|c| c.leading.as_slice()).unwrap_or(&[])
    }

    pub fn inline<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        self.get(path).and_then(|c| c.inline.as_deref())
    }

    pub fn set_inline<S: AsRef<str>>(&mut self, path: &[S], text: impl Into<String>) {
        self.entries.entry(owned(path)).or_default().inline = Some(text.into());
    }

    pub fn set_leading<S: AsRef<str>>(&mut self, path: &[S], lines: Vec<String>) {
        self.entries.entry(owned(path)).or_default().leading = lines;
    }

    pub fn footer(&self) -> &[String] {
        &self.footer
    }

    pub fn set_footer(&mut self, lines: Vec<String>) {
        self.footer = lines;
    }

    /// Copy `other`'s comments under `prefix`, keeping any comment already
    /// recorded at the same path. The footer of `other` is ignored.
    pub fn graft<S: AsRef<str>>(&mut self, prefix: &[S], other: &CommentMap) {
        let prefix = owned(prefix);
        for (path, comment) in &other.entries {
            let mut full = prefix.clone();
            full.extend(path.iter().cloned());
            self.entries.entry(full).or_insert_with(|| comment.clone());
        }
    }

    /// Comments below `prefix`, re-rooted at `prefix`.
    pub fn subtree<S: AsRef<str>>(&self, prefix: &[S]) -> CommentMap {
        let entries = self
            .entries
            .iter()
            .filter(|(path, _)| path.len() > prefix.len() && has_prefix(path, prefix))
            .map(|(path, comment)| (path[prefix.len()..].to_vec(), comment.clone()))
            .collect();
        CommentMap {
            entries,
            footer: Vec::new(),
        }
    }

    /// Drop the comments of `prefix` and everything below it.
    pub fn remove_subtree<S: AsRef<str>>(&mut self, prefix: &[S]) {
        self.entries.retain(|path, _| !has_prefix(path, prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.footer.is_empty()
    }
}

/// Split `key: rest` into the unquoted key and the remainder after the colon.
fn split_key(line: &str) -> Option<(String, &str)> {
    let first = line.chars().next()?;
    if first == '"' || first == '\'' {
        let close = closing_quote(line, first)?;
        let after = line[close + 1..].trim_start();
        let rest = after.strip_prefix(':')?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        return Some((unquote(&line[1..close], first), rest));
    }

    let bytes = line.as_bytes();
    for (idx, ch) in line.char_indices() {
        if ch != ':' {
            continue;
        }
        let next = bytes.get(idx + 1).copied();
        if next.map_or(true, |b| b == b' ' || b == b'\t') {
            let key = line[..idx].trim_end();
            if key.is_empty() {
                return None;
            }
            return Some((key.to_owned(), &line[idx + 1..]));
        }
    }
    None
}

fn closing_quote(text: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((idx, ch)) = chars.next() {
        if quote == '"' {
            if escaped {
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
                continue;
            }
        } else if ch == '\'' && chars.peek().is_some_and(|(_, c)| *c == '\'') {
            chars.next();
            continue;
        }
        if ch == quote {
            return Some(idx);
        }
    }
    None
}

fn unquote(inner: &str, quote: char) -> String {
    if quote == '\'' {
        inner.replace("''", "'")
    } else {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    }
}

/// Separate the value text from a trailing ` # comment`.
fn split_inline_comment(rest: &str) -> (&str, Option<String>) {
    let value = rest.trim_start();
    let offset = rest.len() - value.len();
    let scan_from = match value.chars().next() {
        Some(q @ ('"' | '\'')) => closing_quote(value, q).map_or(value.len(), |idx| idx + 1),
        _ => 0,
    };
    // `#` only opens a comment after whitespace.
    let mut previous_blank = scan_from == 0 && offset > 0;
    for (idx, ch) in value[scan_from..].char_indices() {
        if ch == '#' && previous_blank {
            let at = scan_from + idx;
            let text = value[at + 1..].trim();
            return (&rest[..offset + at], Some(text.to_owned()));
        }
        previous_blank = ch == ' ' || ch == '\t';
    }
    (rest, None)
}
