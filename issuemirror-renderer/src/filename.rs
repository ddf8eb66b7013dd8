//! Document filenames: rendering from a filename template and recovering
//! the item number from an existing filename.

use crate::context::TemplateContext;
use crate::template::{self, scan_conditional, scan_scalar, BlockEnd};

/// Extension appended to every rendered filename.
pub const EXTENSION: &str = ".md";

/// Maximum filename length in bytes, extension included.
pub const MAX_FILENAME_LEN: usize = 255;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\', '/'];

/// Make `raw` safe as a single path component.
///
/// Forbidden characters become `-`, line breaks and tabs collapse into a
/// single space, and leading/trailing dots and whitespace are trimmed.
pub fn sanitize(raw: &str) -> String {
    let mapped = map_chars(raw);
    trim_edges(&mapped).to_string()
}

fn map_chars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if FORBIDDEN.contains(&c) {
            out.push('-');
        } else if c == '\n' || c == '\r' || c == '\t' || c.is_control() {
            if !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Render a filename (with extension) for the item described by `ctx`.
///
/// Falls back to the bare item number when the template renders to nothing
/// usable.
pub fn render_filename(filename_template: &str, ctx: &TemplateContext) -> String {
    let rendered = template::render(filename_template, ctx);
    let mut stem = sanitize(&rendered);
    if stem.is_empty() {
        stem = ctx.get("number").map(sanitize).unwrap_or_default();
    }

    let max_stem = MAX_FILENAME_LEN - EXTENSION.len();
    if stem.len() > max_stem {
        let mut cut = max_stem;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem = trim_edges(&stem[..cut]).to_string();
    }
    format!("{stem}{EXTENSION}")
}

// ---------------------------------------------------------------------------
// Number extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
    Number,
}

/// Recover the item number from `filename` given the template that
/// produced it.
///
/// `{number}` matches one or more digits, every other token (and every
/// conditional block) matches any text, and literal text must match after
/// the same sanitisation rendering applies. The match is anchored at both
/// ends. Returns `None` when the template has no `{number}` token or the
/// filename does not fit the template.
pub fn extract_number(filename: &str, filename_template: &str) -> Option<u64> {
    let stem = filename.strip_suffix(EXTENSION).unwrap_or(filename);
    let segments = parse_segments(filename_template);
    if !segments.contains(&Segment::Number) {
        return None;
    }
    match_segments(&segments, stem).flatten()
}

fn parse_segments(filename_template: &str) -> Vec<Segment> {
    let bytes = filename_template.as_bytes();
    let mut segments: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            let token = if let Some(name) = scan_scalar(filename_template, i) {
                let seg = if name == "number" { Segment::Number } else { Segment::Wildcard };
                Some((seg, i + name.len() + 2))
            } else if let Some(block) = scan_conditional(filename_template, i) {
                match block.end {
                    BlockEnd::Closed { after, .. } => Some((Segment::Wildcard, after)),
                    _ => None,
                }
            } else {
                None
            };
            if let Some((seg, after)) = token {
                push_literal(&mut segments, &mut literal);
                if !(seg == Segment::Wildcard && segments.last() == Some(&Segment::Wildcard)) {
                    segments.push(seg);
                }
                i = after;
                continue;
            }
        }
        let ch = filename_template[i..].chars().next().unwrap_or_default();
        literal.push(ch);
        i += ch.len_utf8().max(1);
    }
    push_literal(&mut segments, &mut literal);

    // Rendering trims the whole name; mirror that on the outermost literals.
    if let Some(Segment::Literal(first)) = segments.first_mut() {
        *first = first.trim_start_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    }
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        *last = last.trim_end_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    }
    segments.retain(|s| !matches!(s, Segment::Literal(l) if l.is_empty()));
    segments
}

fn push_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(map_chars(literal)));
        literal.clear();
    }
}

/// Backtracking matcher. `Some(capture)` on a full match.
fn match_segments(segments: &[Segment], input: &str) -> Option<Option<u64>> {
    let Some((head, rest)) = segments.split_first() else {
        return input.is_empty().then_some(None);
    };
    match head {
        Segment::Literal(lit) => {
            let remaining = input.strip_prefix(lit.as_str())?;
            match_segments(rest, remaining)
        }
        Segment::Wildcard => {
            let mut cut = 0;
            loop {
                if let Some(found) = match_segments(rest, &input[cut..]) {
                    return Some(found);
                }
                let next = input[cut..].chars().next()?;
                cut += next.len_utf8();
            }
        }
        Segment::Number => {
            let digits = input.bytes().take_while(u8::is_ascii_digit).count();
            for len in (1..=digits).rev() {
                let Ok(number) = input[..len].parse::<u64>() else {
                    continue;
                };
                if let Some(inner) = match_segments(rest, &input[len..]) {
                    return Some(inner.or(Some(number)));
                }
            }
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
