//! The `{name}` / `{name:content}` template mini-language.
//!
//! Rendering is two passes over the template text:
//!
//! 1. **Conditional blocks** `{name:content}` are resolved first. The block is
//!    replaced by `content` when `name` is truthy and removed otherwise.
//!    `content` may span lines and may contain `{var}` tokens; braces are
//!    depth-matched so the first balanced `}` closes the block.
//! 2. **Scalar tokens** `{name}` are replaced by their value in a single pass.
//!    Substituted values are never re-scanned, so a title containing `{body}`
//!    stays literal.
//!
//! Unknown names stay in the output verbatim. `{% … %}` persist tags are
//! never treated as tokens because `%` cannot start an identifier.
//!
//! A conditional block nested inside another conditional block is not
//! supported: the outer block is copied through literally.

use crate::context::TemplateContext;

/// Values that make a conditional block disappear.
pub const FALSY_VALUES: &[&str] = &["", "0", "false", "unknown", "unassigned"];

/// Whether a context value counts as true for a conditional block.
/// Absent variables are false.
pub fn is_truthy(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => !FALSY_VALUES.contains(&v.trim()),
    }
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let resolved = resolve_conditionals(template, ctx);
    substitute(&resolved, ctx)
}

// ---------------------------------------------------------------------------
// Pass 1: conditional blocks
// ---------------------------------------------------------------------------

fn resolve_conditionals(template: &str, ctx: &TemplateContext) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut copied_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let Some(block) = scan_conditional(template, i) else {
            i += 1;
            continue;
        };
        match block.end {
            BlockEnd::Closed { content_end, after } => {
                out.push_str(&template[copied_from..i]);
                if is_truthy(ctx.get(block.name)) {
                    out.push_str(&template[block.content_start..content_end]);
                }
                i = after;
                copied_from = after;
            }
            // Left in place, including everything up to its matching brace.
            BlockEnd::Nested { after } => i = after,
            BlockEnd::Unterminated => i += 1,
        }
    }
    out.push_str(&template[copied_from..]);
    out
}

pub(crate) struct ConditionalBlock<'a> {
    pub(crate) name: &'a str,
    pub(crate) content_start: usize,
    pub(crate) end: BlockEnd,
}

pub(crate) enum BlockEnd {
    /// `content_end` is the index of the closing brace, `after` the index past it.
    Closed { content_end: usize, after: usize },
    /// The block contains another conditional block.
    Nested { after: usize },
    Unterminated,
}

/// Recognise `{ident:` at `open` and find where the block ends.
pub(crate) fn scan_conditional(text: &str, open: usize) -> Option<ConditionalBlock<'_>> {
    let bytes = text.as_bytes();
    let name_end = scan_ident(bytes, open + 1)?;
    if bytes.get(name_end) != Some(&b':') {
        return None;
    }
    let content_start = name_end + 1;
    Some(ConditionalBlock {
        name: &text[open + 1..name_end],
        content_start,
        end: scan_block_end(bytes, content_start),
    })
}

fn scan_block_end(bytes: &[u8], start: usize) -> BlockEnd {
    let mut depth = 0usize;
    let mut nested = false;
    let mut j = start;
    while j < bytes.len() {
        match bytes[j] {
            b'{' => {
                if let Some(end) = scan_ident(bytes, j + 1) {
                    if bytes.get(end) == Some(&b':') {
                        nested = true;
                    }
                }
                depth += 1;
            }
            b'}' if depth == 0 => {
                return if nested {
                    BlockEnd::Nested { after: j + 1 }
                } else {
                    BlockEnd::Closed { content_end: j, after: j + 1 }
                };
            }
            b'}' => depth -= 1,
            _ => {}
        }
        j += 1;
    }
    BlockEnd::Unterminated
}

// ---------------------------------------------------------------------------
// Pass 2: scalar tokens
// ---------------------------------------------------------------------------

fn substitute(text: &str, ctx: &TemplateContext) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(name) = scan_scalar(text, i) {
                if let Some(value) = ctx.get(name) {
                    out.push_str(&text[copied_from..i]);
                    out.push_str(value);
                    i += name.len() + 2;
                    copied_from = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    out.push_str(&text[copied_from..]);
    out
}

/// Recognise `{ident}` at `open` and return the identifier.
pub(crate) fn scan_scalar(text: &str, open: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let end = scan_ident(bytes, open + 1)?;
    (bytes.get(end) == Some(&b'}')).then(|| &text[open + 1..end])
}

/// Identifier rule: `[A-Za-z_][A-Za-z0-9_]*`. Returns the index past its end.
fn scan_ident(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    Some(end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
