//! Persist blocks: user-owned regions that survive document regeneration.
//!
//! ```text
//! {% persist "notes" %}
//! anything the user writes here is carried over
//! {% endpersist %}
//! ```
//!
//! Whitespace inside the tags is flexible. Names are non-empty and may not
//! contain `"` or a line break. A block ends at the first `endpersist`
//! after its opening tag. When an opening tag appears before the previous
//! one was closed, the earlier opener is treated as plain text. When a name
//! appears twice, the first occurrence wins.
//!
//! [`merge`] puts extracted blocks back into a freshly rendered document:
//! by name where the new document has a same-name marker, otherwise next to
//! the surrounding lines recorded at extraction time.

use std::collections::HashSet;
use std::ops::Range;

use crate::document::header_end_line;

/// Number of context lines recorded on each side of a block.
pub const CONTEXT_LINES: usize = 2;

/// One extracted persist block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistBlock {
    pub name: String,
    /// Text between the tags, byte for byte.
    pub content: String,
    /// The full block as it appeared, tags included.
    pub raw: String,
    /// Byte range of the full block in the source document.
    pub span: Range<usize>,
    /// Zero-based line of the opening tag.
    pub line: usize,
    /// Nearest non-empty lines above the block, nearest first.
    pub before: Vec<String>,
    /// Nearest non-empty lines below the block, nearest first.
    pub after: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tag scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    Open(String),
    Close,
}

#[derive(Debug, Clone)]
struct Marker {
    name: String,
    open: Range<usize>,
    close: Range<usize>,
}

impl Marker {
    fn span(&self) -> Range<usize> {
        self.open.start..self.close.end
    }
}

/// Parse a tag starting at `at` (which must point at `{%`).
/// Returns the tag and the index past its closing `%}`.
fn parse_tag(text: &str, at: usize) -> Option<(Tag, usize)> {
    let rest = text.get(at..)?.strip_prefix("{%")?;
    let inner = rest.trim_start_matches([' ', '\t']);

    if let Some(after_kw) = inner.strip_prefix("endpersist") {
        let tail = after_kw.trim_start_matches([' ', '\t']);
        let tail = tail.strip_prefix("%}")?;
        return Some((Tag::Close, text.len() - tail.len()));
    }

    let after_kw = inner.strip_prefix("persist")?;
    let quoted = after_kw.trim_start_matches([' ', '\t']);
    if quoted.len() == after_kw.len() {
        return None;
    }
    let quoted = quoted.strip_prefix('"')?;
    let name_len = quoted.find(['"', '\n', '\r'])?;
    if name_len == 0 || !quoted[name_len..].starts_with('"') {
        return None;
    }
    let name = &quoted[..name_len];
    let tail = quoted[name_len + 1..].trim_start_matches([' ', '\t']);
    let tail = tail.strip_prefix("%}")?;
    Some((Tag::Open(name.to_string()), text.len() - tail.len()))
}

fn scan_markers(text: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut pending: Option<(String, Range<usize>)> = None;
    let mut pos = 0;

    while let Some(rel) = text[pos..].find("{%") {
        let at = pos + rel;
        match parse_tag(text, at) {
            Some((Tag::Open(name), end)) => {
                pending = Some((name, at..end));
                pos = end;
            }
            Some((Tag::Close, end)) => {
                if let Some((name, open)) = pending.take() {
                    markers.push(Marker { name, open, close: at..end });
                }
                pos = end;
            }
            None => pos = at + 2,
        }
    }
    markers
}

fn is_structural(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed == "---" {
        return true;
    }
    trimmed
        .match_indices("{%")
        .any(|(at, _)| parse_tag(trimmed, at).is_some())
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every persist block from `doc`, in document order.
pub fn extract(doc: &str) -> Vec<PersistBlock> {
    let lines: Vec<&str> = doc.split('\n').collect();
    let header_end = header_end_line(doc);
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();

    for marker in scan_markers(doc) {
        if !seen.insert(marker.name.clone()) {
            continue;
        }
        let line = line_of(doc, marker.open.start);
        let close_line = line_of(doc, marker.close.start);

        let before = lines[header_end.min(line)..line]
            .iter()
            .rev()
            .filter(|l| !is_structural(l))
            .take(CONTEXT_LINES)
            .map(|l| l.trim_end().to_string())
            .collect();
        let after = lines
            .iter()
            .skip(close_line + 1)
            .filter(|l| !is_structural(l))
            .take(CONTEXT_LINES)
            .map(|l| l.trim_end().to_string())
            .collect();

        blocks.push(PersistBlock {
            name: marker.name.clone(),
            content: doc[marker.open.end..marker.close.start].to_string(),
            raw: doc[marker.span()].to_string(),
            span: marker.span(),
            line,
            before,
            after,
        });
    }
    blocks
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|b| *b == b'\n').count()
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Carry `blocks` (extracted from `old_doc`) into `new_doc`.
///
/// 1. A block whose name has a marker in `new_doc` replaces that marker's
///    content exactly.
/// 2. Any other block is inserted after the first line (below the header)
///    equal to one of its recorded `before` lines, nearest first; failing
///    that, before the first line equal to one of its `after` lines;
///    failing that, at the same relative position it had in `old_doc`,
///    never inside the header.
///
/// Every block ends up in the result exactly once with its content intact.
pub fn merge(new_doc: &str, old_doc: &str, blocks: &[PersistBlock]) -> String {
    if blocks.is_empty() {
        return new_doc.to_string();
    }

    // Step 1: fill same-name markers.
    let mut out = String::with_capacity(new_doc.len());
    let mut copied_from = 0;
    let mut filled = HashSet::new();
    for marker in scan_markers(new_doc) {
        if filled.contains(marker.name.as_str()) {
            continue;
        }
        if let Some(block) = blocks.iter().find(|b| b.name == marker.name) {
            out.push_str(&new_doc[copied_from..marker.open.end]);
            out.push_str(&block.content);
            copied_from = marker.close.start;
            filled.insert(block.name.as_str());
        }
    }
    out.push_str(&new_doc[copied_from..]);

    // Step 2: place the rest.
    let old_total = old_doc.split('\n').count().max(1);
    for block in blocks.iter().filter(|b| !filled.contains(b.name.as_str())) {
        out = insert_block(&out, block, old_total);
    }
    out
}

fn insert_block(doc: &str, block: &PersistBlock, old_total: usize) -> String {
    let lines: Vec<&str> = doc.split('\n').collect();
    let starts = line_starts(doc);
    let header_end = header_end_line(doc);
    let protected = protected_lines(doc, lines.len());

    let find_line = |wanted: &str| {
        (header_end..lines.len())
            .find(|&i| !protected.contains(&i) && lines[i].trim_end() == wanted)
    };

    let target = block
        .before
        .iter()
        .find_map(|anchor| find_line(anchor))
        .map(|i| i + 1)
        .or_else(|| block.after.iter().find_map(|anchor| find_line(anchor)))
        .unwrap_or_else(|| {
            let fraction = block.line as f64 / old_total as f64;
            let mut target = (fraction * lines.len() as f64).round() as usize;
            target = target.clamp(header_end, lines.len());
            while protected.contains(&target) {
                target += 1;
            }
            target
        });

    let mut out = String::with_capacity(doc.len() + block.raw.len() + 2);
    if target >= lines.len() {
        out.push_str(doc);
        if !doc.is_empty() && !doc.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&block.raw);
        out.push('\n');
    } else {
        let at = starts[target];
        out.push_str(&doc[..at]);
        out.push_str(&block.raw);
        out.push('\n');
        out.push_str(&doc[at..]);
    }
    out
}

fn line_starts(doc: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(doc.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Lines strictly inside an existing block, plus its closing-tag line.
/// Inserting at one of these would split a block.
fn protected_lines(doc: &str, total: usize) -> HashSet<usize> {
    let mut protected = HashSet::new();
    for marker in scan_markers(doc) {
        let first = line_of(doc, marker.open.start) + 1;
        let last = line_of(doc, marker.close.start);
        for line in first..=last.min(total.saturating_sub(1)) {
            protected.insert(line);
        }
    }
    protected
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
