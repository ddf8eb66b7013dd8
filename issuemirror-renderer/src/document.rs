//! Whole-document rendering: header composition and the body templates.
//!
//! A document is a `---`-delimited YAML header followed by a Markdown body.
//! The header always carries the keys sync needs to find and judge the
//! document later (`number`, `repository`, `type`, `updated`, `updateMode`,
//! `allowDelete`). A custom template that writes its own header gets any
//! missing required keys inserted before its closing delimiter; a template
//! without a header gets the default header prepended.

use std::path::{Path, PathBuf};

use issuemirror_core::{Comment, ItemKind, RemoteItem, RepoId, UpdateMode};

use crate::context::{iso, yaml_list, yaml_quote, TemplateContext};
use crate::error::RenderError;
use crate::template;

/// Header delimiter line.
pub const DELIMITER: &str = "---";

/// Keys every rendered header contains.
pub const REQUIRED_KEYS: &[&str] =
    &["number", "repository", "type", "updated", "updateMode", "allowDelete"];

const ISSUE_TEMPLATE: &str = include_str!("templates/issue.md");
const PULL_REQUEST_TEMPLATE: &str = include_str!("templates/pull_request.md");
const APPEND_TEMPLATE: &str = include_str!("templates/append.md");

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Byte layout of a document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBounds {
    /// Start of the first header line (just past the opening delimiter).
    pub inner_start: usize,
    /// Start of the closing delimiter line.
    pub close_start: usize,
    /// Start of the body (just past the closing delimiter line).
    pub body_start: usize,
    /// Zero-based index of the first body line.
    pub body_line: usize,
}

/// Locate the header. `None` when the document does not open with `---`
/// or the header is never closed.
pub fn header_bounds(doc: &str) -> Option<HeaderBounds> {
    let mut offset = 0;
    let mut line_no = 0;
    let mut inner_start = None;

    for line in doc.split_inclusive('\n') {
        let is_delimiter = line.trim_end() == DELIMITER;
        match (inner_start, is_delimiter) {
            (None, true) if line_no == 0 => inner_start = Some(offset + line.len()),
            (None, _) => return None,
            (Some(inner_start), true) => {
                return Some(HeaderBounds {
                    inner_start,
                    close_start: offset,
                    body_start: offset + line.len(),
                    body_line: line_no + 1,
                });
            }
            (Some(_), false) => {}
        }
        offset += line.len();
        line_no += 1;
    }
    None
}

/// Split into `(header_yaml, body)`.
pub fn split_header(doc: &str) -> Option<(&str, &str)> {
    let b = header_bounds(doc)?;
    Some((&doc[b.inner_start..b.close_start], &doc[b.body_start..]))
}

/// Index of the first line after the header; `0` when there is none.
pub fn header_end_line(doc: &str) -> usize {
    header_bounds(doc).map(|b| b.body_line).unwrap_or(0)
}

fn header_has_key(header: &str, key: &str) -> bool {
    header.lines().any(|line| {
        line.strip_prefix(key)
            .map(|rest| rest.trim_start().starts_with(':'))
            .unwrap_or(false)
    })
}

/// Replace the value of a top-level header key in place, or insert the key
/// before the closing delimiter. Documents without a header are returned
/// unchanged.
pub fn set_header_value(doc: &str, key: &str, yaml_value: &str) -> String {
    let Some(b) = header_bounds(doc) else {
        return doc.to_string();
    };
    let header = &doc[b.inner_start..b.close_start];
    let mut lines: Vec<String> = header.lines().map(str::to_string).collect();
    let replacement = format!("{key}: {yaml_value}");
    match lines.iter_mut().find(|l| header_has_key(l, key)) {
        Some(line) => *line = replacement,
        None => lines.push(replacement),
    }
    let mut out = String::with_capacity(doc.len() + yaml_value.len());
    out.push_str(&doc[..b.inner_start]);
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&doc[b.close_start..]);
    out
}

// ---------------------------------------------------------------------------
// Render input
// ---------------------------------------------------------------------------

/// Everything needed to render one item.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub repo: &'a RepoId,
    pub item: &'a RemoteItem,
    /// `None` when comments are not included for this kind.
    pub comments: Option<&'a [Comment]>,
    pub date_format: Option<&'a str>,
    pub update_mode: UpdateMode,
    pub allow_delete: bool,
}

impl<'a> RenderInput<'a> {
    pub fn context(&self) -> TemplateContext {
        TemplateContext::for_item(self.repo, self.item, self.comments, self.date_format)
    }

    fn required_entries(&self) -> Vec<(&'static str, String)> {
        let f = self.item.fields();
        vec![
            ("number", f.number.to_string()),
            ("repository", yaml_quote(&self.repo.to_string())),
            ("type", yaml_quote(self.item.kind().key())),
            ("updated", yaml_quote(&iso(&f.updated_at))),
            ("updateMode", yaml_quote(self.update_mode.as_str())),
            ("allowDelete", self.allow_delete.to_string()),
        ]
    }

    fn default_entries(&self) -> Vec<(&'static str, String)> {
        let f = self.item.fields();
        let mut entries = vec![
            ("number", f.number.to_string()),
            ("title", yaml_quote(&f.title)),
            ("status", yaml_quote(&f.state.to_string())),
            ("type", yaml_quote(self.item.kind().key())),
            ("repository", yaml_quote(&self.repo.to_string())),
            ("author", yaml_quote(&f.author)),
            ("assignees", yaml_list(&f.assignees)),
            ("labels", yaml_list(&f.labels)),
            ("created", yaml_quote(&iso(&f.created_at))),
            ("updated", yaml_quote(&iso(&f.updated_at))),
        ];
        if let Some(closed) = &f.closed_at {
            entries.push(("closed", yaml_quote(&iso(closed))));
        }
        entries.push(("url", yaml_quote(&f.url)));
        if let Some(pr) = self.item.as_pull_request() {
            entries.push(("merged", pr.merged.to_string()));
            entries.push(("draft", pr.draft.to_string()));
            entries.push(("base", yaml_quote(&pr.base_branch)));
            entries.push(("head", yaml_quote(&pr.head_branch)));
        }
        entries.push(("updateMode", yaml_quote(self.update_mode.as_str())));
        entries.push(("allowDelete", self.allow_delete.to_string()));
        entries
    }
}

// ---------------------------------------------------------------------------
// DocumentRenderer
// ---------------------------------------------------------------------------

/// Renders full documents and append fragments for one item kind.
///
/// Create once per (repository, kind) pass with [`DocumentRenderer::load`]
/// and reuse for every item.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    kind: ItemKind,
    template: String,
    source: Option<PathBuf>,
}

impl DocumentRenderer {
    /// The built-in template for `kind`.
    pub fn builtin(kind: ItemKind) -> Self {
        let template = match kind {
            ItemKind::Issue => ISSUE_TEMPLATE,
            ItemKind::PullRequest => PULL_REQUEST_TEMPLATE,
        };
        DocumentRenderer { kind, template: template.to_string(), source: None }
    }

    /// A renderer using caller-supplied template text.
    pub fn from_template(kind: ItemKind, template: impl Into<String>) -> Self {
        DocumentRenderer {
            kind,
            template: normalize_newlines(&template.into()),
            source: None,
        }
    }

    /// Load a user template file, or the built-in template when `path` is `None`.
    pub fn load(kind: ItemKind, path: Option<&Path>) -> Result<Self, RenderError> {
        let Some(path) = path else {
            return Ok(Self::builtin(kind));
        };
        let contents = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Err(RenderError::EmptyTemplate { path: path.to_path_buf() });
        }
        let mut renderer = Self::from_template(kind, contents);
        renderer.source = Some(path.to_path_buf());
        Ok(renderer)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Path of the user template in use, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Render the complete document (header + body) for `input`.
    pub fn render(&self, input: &RenderInput<'_>) -> String {
        let ctx = input.context();
        let rendered = normalize_newlines(&template::render(&self.template, &ctx));
        let mut doc = compose(&rendered, input);
        if !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc
    }

    /// Render the fragment appended to a document in append mode.
    pub fn render_fragment(&self, input: &RenderInput<'_>) -> String {
        let ctx = input.context();
        normalize_newlines(&template::render(APPEND_TEMPLATE, &ctx))
    }
}

fn compose(rendered: &str, input: &RenderInput<'_>) -> String {
    match header_bounds(rendered) {
        Some(b) => {
            let header = &rendered[b.inner_start..b.close_start];
            let missing: Vec<String> = input
                .required_entries()
                .into_iter()
                .filter(|(key, _)| !header_has_key(header, key))
                .map(|(key, value)| format!("{key}: {value}\n"))
                .collect();
            if missing.is_empty() {
                return rendered.to_string();
            }
            let mut out = String::with_capacity(rendered.len() + 128);
            out.push_str(&rendered[..b.close_start]);
            for line in missing {
                out.push_str(&line);
            }
            out.push_str(&rendered[b.close_start..]);
            out
        }
        None => {
            let mut out = String::with_capacity(rendered.len() + 512);
            out.push_str(DELIMITER);
            out.push('\n');
            for (key, value) in input.default_entries() {
                out.push_str(key);
                out.push_str(": ");
                out.push_str(&value);
                out.push('\n');
            }
            out.push_str(DELIMITER);
            out.push('\n');
            out.push_str(rendered.trim_start_matches('\n'));
            out
        }
    }
}

/// CRLF → LF so rendered documents compare stably across platforms.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
