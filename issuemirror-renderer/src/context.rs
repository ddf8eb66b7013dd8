//! Template context: the flat variable map built from one [`RemoteItem`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use issuemirror_core::{Comment, CommentKind, RemoteItem, RepoId};

/// Format used when no `date_format` is configured: the locale-style
/// date and time representation.
pub const DEFAULT_DATE_FORMAT: &str = "%c";

/// Placeholder for empty assignee lists in the comma and singular forms.
pub const UNASSIGNED: &str = "unassigned";

/// Variable name → string value. Absent names stay literal when rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateContext {
    vars: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Build the variable set for `item`.
    ///
    /// `comments` is `None` when comments are not included for this kind;
    /// the `comments` variable is then absent while `comments_count` still
    /// reports the remote count.
    pub fn for_item(
        repo: &RepoId,
        item: &RemoteItem,
        comments: Option<&[Comment]>,
        date_format: Option<&str>,
    ) -> Self {
        let f = item.fields();
        let mut ctx = TemplateContext::default();

        ctx.insert("title", f.title.as_str());
        ctx.insert("number", f.number.to_string());
        ctx.insert("status", f.state.to_string());
        ctx.insert("state", f.state.to_string());
        ctx.insert("author", f.author.as_str());
        ctx.insert("body", f.body.clone().unwrap_or_default());
        ctx.insert("url", f.url.as_str());
        ctx.insert("repository", repo.to_string());
        ctx.insert("owner", repo.owner.as_str());
        ctx.insert("repo_name", repo.name.as_str());
        ctx.insert("type", item.kind().key());

        ctx.insert(
            "assignee",
            f.assignees.first().map(String::as_str).unwrap_or(UNASSIGNED),
        );
        ctx.insert_collection("assignees", &f.assignees, UNASSIGNED);
        ctx.insert_collection("labels", &f.labels, "");

        ctx.insert("created", format_date(&f.created_at, date_format));
        ctx.insert("updated", format_date(&f.updated_at, date_format));
        ctx.insert("created_iso", iso(&f.created_at));
        ctx.insert("updated_iso", iso(&f.updated_at));
        if let Some(closed) = &f.closed_at {
            ctx.insert("closed", format_date(closed, date_format));
            ctx.insert("closed_iso", iso(closed));
        }

        if let Some(milestone) = &f.milestone {
            ctx.insert("milestone", milestone.as_str());
        }
        ctx.insert("comments_count", f.comments.to_string());
        ctx.insert("locked", f.locked.to_string());
        if let Some(reason) = &f.lock_reason {
            ctx.insert("lock_reason", reason.as_str());
        }

        if let Some(pr) = item.as_pull_request() {
            ctx.insert("merged", pr.merged.to_string());
            if let Some(at) = &pr.merged_at {
                ctx.insert("merged_at", format_date(at, date_format));
            }
            let mergeable = match pr.mergeable {
                Some(true) => "true",
                Some(false) => "false",
                None => "unknown",
            };
            ctx.insert("mergeable", mergeable);
            ctx.insert("draft", pr.draft.to_string());
            ctx.insert("base_branch", pr.base_branch.as_str());
            ctx.insert("head_branch", pr.head_branch.as_str());
            ctx.insert("reviewers", pr.requested_reviewers.join(", "));
        }

        if let Some(comments) = comments {
            if !comments.is_empty() {
                ctx.insert("comments", render_comments(comments, date_format));
            }
        }

        ctx
    }

    /// Insert the five renderings of a string collection:
    /// `name` (comma list or `empty`), `name_list`, `name_hash`, `name_yaml`.
    fn insert_collection(&mut self, name: &str, values: &[String], empty: &str) {
        let comma = if values.is_empty() {
            empty.to_string()
        } else {
            values.join(", ")
        };
        self.insert(name, comma);
        self.insert(format!("{name}_list"), bullet_list(values));
        self.insert(format!("{name}_hash"), hashtags(values));
        self.insert(format!("{name}_yaml"), yaml_list(values));
    }
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

/// Format a timestamp with a strftime-style pattern.
///
/// An empty or invalid pattern falls back to [`DEFAULT_DATE_FORMAT`].
pub fn format_date(at: &DateTime<Utc>, date_format: Option<&str>) -> String {
    let pattern = date_format.filter(|p| !p.trim().is_empty());
    if let Some(pattern) = pattern {
        let mut out = String::new();
        if write!(out, "{}", at.format(pattern)).is_ok() {
            return out;
        }
    }
    at.format(DEFAULT_DATE_FORMAT).to_string()
}

/// RFC 3339 with second precision, e.g. `2024-03-01T12:00:00Z`.
pub fn iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn bullet_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("- {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hashtags(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("#{}", v.trim().replace(char::is_whitespace, "_")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inline YAML sequence of double-quoted strings.
pub fn yaml_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| yaml_quote(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Double-quote a scalar for a YAML header line.
pub fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Markdown rendering of a comment thread, oldest first.
pub fn render_comments(comments: &[Comment], date_format: Option<&str>) -> String {
    let mut sorted: Vec<&Comment> = comments.iter().collect();
    sorted.sort_by_key(|c| c.created_at);

    let mut sections = Vec::with_capacity(sorted.len());
    for comment in sorted {
        let when = format_date(&comment.created_at, date_format);
        let heading = match &comment.kind {
            CommentKind::General => format!("### {} · {}", comment.author, when),
            CommentKind::Review { path: Some(path) } => {
                format!("### {} · {} · review on `{}`", comment.author, when, path)
            }
            CommentKind::Review { path: None } => {
                format!("### {} · {} · review", comment.author, when)
            }
        };
        sections.push(format!("{heading}\n\n{}", comment.body.trim_end()));
    }
    sections.join("\n\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use issuemirror_core::{Issue, ItemFields, PullRequest};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn repo() -> RepoId {
        RepoId::parse("acme/widgets").unwrap()
    }

    fn issue() -> RemoteItem {
        let mut fields = ItemFields::new(7, "Crash on save", "octo", at(1));
        fields.labels = vec!["bug".into(), "needs triage".into()];
        RemoteItem::from(Issue { fields })
    }

    #[test]
    fn scalar_fields_are_present() {
        let ctx = TemplateContext::for_item(&repo(), &issue(), None, Some("%Y-%m-%d"));
        assert_eq!(ctx.get("number"), Some("7"));
        assert_eq!(ctx.get("status"), Some("open"));
        assert_eq!(ctx.get("repository"), Some("acme/widgets"));
        assert_eq!(ctx.get("owner"), Some("acme"));
        assert_eq!(ctx.get("repo_name"), Some("widgets"));
        assert_eq!(ctx.get("type"), Some("issue"));
        assert_eq!(ctx.get("created"), Some("2024-03-01"));
        assert_eq!(ctx.get("created_iso"), Some("2024-03-01T12:00:00Z"));
        assert_eq!(ctx.get("body"), Some(""));
        assert!(!ctx.contains("closed"));
        assert!(!ctx.contains("merged"));
    }

    #[test]
    fn collection_renderings() {
        let ctx = TemplateContext::for_item(&repo(), &issue(), None, None);
        assert_eq!(ctx.get("labels"), Some("bug, needs triage"));
        assert_eq!(ctx.get("labels_list"), Some("- bug\n- needs triage"));
        assert_eq!(ctx.get("labels_hash"), Some("#bug #needs_triage"));
        assert_eq!(ctx.get("labels_yaml"), Some("[\"bug\", \"needs triage\"]"));
    }

    #[test]
    fn empty_collections() {
        let ctx = TemplateContext::for_item(&repo(), &issue(), None, None);
        assert_eq!(ctx.get("assignees"), Some(UNASSIGNED));
        assert_eq!(ctx.get("assignee"), Some(UNASSIGNED));
        assert_eq!(ctx.get("assignees_list"), Some(""));
        assert_eq!(ctx.get("assignees_hash"), Some(""));
        assert_eq!(ctx.get("assignees_yaml"), Some("[]"));
    }

    #[test]
    fn pull_request_fields() {
        let mut pr = PullRequest::new(ItemFields::new(3, "Add feature", "octo", at(2)));
        pr.base_branch = "main".into();
        pr.head_branch = "feature".into();
        let ctx = TemplateContext::for_item(&repo(), &RemoteItem::from(pr), None, None);
        assert_eq!(ctx.get("type"), Some("pull_request"));
        assert_eq!(ctx.get("mergeable"), Some("unknown"));
        assert_eq!(ctx.get("merged"), Some("false"));
        assert_eq!(ctx.get("base_branch"), Some("main"));
    }

    #[test]
    fn invalid_date_format_falls_back() {
        let formatted = format_date(&at(1), Some("%Q broken"));
        assert_eq!(formatted, at(1).format(DEFAULT_DATE_FORMAT).to_string());
    }

    #[test]
    fn comments_render_oldest_first() {
        let comments = vec![
            Comment {
                author: "b".into(),
                body: "second".into(),
                created_at: at(3),
                kind: CommentKind::Review { path: Some("src/lib.rs".into()) },
            },
            Comment {
                author: "a".into(),
                body: "first".into(),
                created_at: at(2),
                kind: CommentKind::General,
            },
        ];
        let ctx = TemplateContext::for_item(&repo(), &issue(), Some(&comments), Some("%Y-%m-%d"));
        let rendered = ctx.get("comments").unwrap();
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(first < second);
        assert!(rendered.contains("review on `src/lib.rs`"));
    }

    #[test]
    fn yaml_quote_escapes() {
        assert_eq!(yaml_quote(r#"say "hi" \ bye"#), r#""say \"hi\" \\ bye""#);
    }
}
