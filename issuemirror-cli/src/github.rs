//! GitHub REST implementation of [`RemoteSource`].
//!
//! Blocking requests through a `ureq` agent, 100 entries per page, following
//! `Link: <...>; rel="next"` headers. The token comes from `GITHUB_TOKEN` or
//! the config's `github_token`; without one only public repositories work
//! and `current_user` fails.
//!
//! The pulls listing never carries `mergeable`, so open pull requests are
//! each fetched once more from `pulls/{number}`. History listings skip that
//! request; their entries are only used for retention decisions.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use issuemirror_core::{
    Comment, CommentKind, GlobalSettings, Issue, ItemFields, ItemKind, ItemState, PullRequest,
    RemoteItem, RepoId,
};
use issuemirror_sync::{ItemQuery, RemoteSource, SyncError};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Overrides the API root (GitHub Enterprise, tests).
pub const API_URL_ENV: &str = "ISSUEMIRROR_GITHUB_API";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("issuemirror/", env!("CARGO_PKG_VERSION"));

pub struct GithubSource {
    agent: ureq::Agent,
    api_url: String,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build();
        GithubSource {
            agent,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Environment first, then config.
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| settings.github_token.clone());
        let api_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(api_url, token)
    }

    fn get(&self, url: &str) -> Result<ureq::Response, SyncError> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request.call().map_err(|err| match err {
            ureq::Error::Status(code, response) => {
                let detail = response
                    .into_json::<ApiError>()
                    .map(|e| e.message)
                    .unwrap_or_default();
                SyncError::Remote(format!("GET {url}: HTTP {code} {detail}").trim_end().to_string())
            }
            ureq::Error::Transport(transport) => SyncError::Remote(format!("GET {url}: {transport}")),
        })
    }

    /// Collect pages starting at `url` until there is no next page or `keep`
    /// rejects an entry.
    fn get_pages<T: DeserializeOwned>(
        &self,
        url: String,
        mut keep: impl FnMut(&T) -> bool,
    ) -> Result<Vec<T>, SyncError> {
        let mut out = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let response = self.get(&url)?;
            let following = response.header("link").and_then(next_link);
            let page: Vec<T> = response
                .into_json()
                .map_err(|e| SyncError::Remote(format!("GET {url}: invalid JSON: {e}")))?;
            for entry in page {
                if !keep(&entry) {
                    return Ok(out);
                }
                out.push(entry);
            }
            next = following;
        }
        Ok(out)
    }

    fn repo_url(&self, repo: &RepoId, path: &str) -> String {
        format!("{}/repos/{}/{}/{path}", self.api_url, repo.owner, repo.name)
    }

    fn list_issues(&self, repo: &RepoId, query: ItemQuery) -> Result<Vec<RemoteItem>, SyncError> {
        let filter = match query {
            ItemQuery::Open => "state=open".to_string(),
            ItemQuery::UpdatedSince(cutoff) => format!("state=all&since={}", iso(&cutoff)),
        };
        let url = self.repo_url(repo, &format!("issues?{filter}&per_page={PER_PAGE}"));
        let issues: Vec<ApiIssue> = self.get_pages(url, |_| true)?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| RemoteItem::from(Issue { fields: issue.into_fields() }))
            .collect())
    }

    fn list_pulls(&self, repo: &RepoId, query: ItemQuery) -> Result<Vec<RemoteItem>, SyncError> {
        let state = match query {
            ItemQuery::Open => "open",
            ItemQuery::UpdatedSince(_) => "all",
        };
        let url = self.repo_url(
            repo,
            &format!("pulls?state={state}&sort=updated&direction=desc&per_page={PER_PAGE}"),
        );
        // Sorted newest first, so the first entry older than the cutoff ends the listing.
        let pulls: Vec<ApiPull> = self.get_pages(url, |pull: &ApiPull| match query {
            ItemQuery::Open => true,
            ItemQuery::UpdatedSince(cutoff) => pull.common.updated_at >= cutoff,
        })?;
        let mut items = Vec::with_capacity(pulls.len());
        for pull in pulls {
            let mut pr = pull.into_pull_request();
            if query == ItemQuery::Open {
                pr.mergeable = self.pull_mergeable(repo, pr.fields.number)?;
            }
            items.push(RemoteItem::from(pr));
        }
        Ok(items)
    }

    /// `None` while GitHub is still computing the merge state.
    fn pull_mergeable(&self, repo: &RepoId, number: u64) -> Result<Option<bool>, SyncError> {
        let url = self.repo_url(repo, &format!("pulls/{number}"));
        let detail: ApiMergeState = self
            .get(&url)?
            .into_json()
            .map_err(|e| SyncError::Remote(format!("GET {url}: invalid JSON: {e}")))?;
        Ok(detail.mergeable)
    }
}

impl RemoteSource for GithubSource {
    fn current_user(&self) -> Result<String, SyncError> {
        if self.token.is_none() {
            return Err(SyncError::Remote(format!(
                "no GitHub token; set {TOKEN_ENV} or github_token in the config"
            )));
        }
        let user: ApiUser = self
            .get(&format!("{}/user", self.api_url))?
            .into_json()
            .map_err(|e| SyncError::Remote(format!("GET /user: invalid JSON: {e}")))?;
        Ok(user.login)
    }

    fn list_items(
        &self,
        repo: &RepoId,
        kind: ItemKind,
        query: ItemQuery,
    ) -> Result<Vec<RemoteItem>, SyncError> {
        match kind {
            ItemKind::Issue => self.list_issues(repo, query),
            ItemKind::PullRequest => self.list_pulls(repo, query),
        }
    }

    fn list_comments(
        &self,
        repo: &RepoId,
        kind: ItemKind,
        number: u64,
    ) -> Result<Vec<Comment>, SyncError> {
        let url = self.repo_url(repo, &format!("issues/{number}/comments?per_page={PER_PAGE}"));
        let mut comments: Vec<Comment> = self
            .get_pages(url, |_: &ApiComment| true)?
            .into_iter()
            .map(|c| c.into_comment(false))
            .collect();
        if kind == ItemKind::PullRequest {
            let url = self.repo_url(repo, &format!("pulls/{number}/comments?per_page={PER_PAGE}"));
            comments.extend(
                self.get_pages(url, |_: &ApiComment| true)?
                    .into_iter()
                    .map(|c| c.into_comment(true)),
            );
        }
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }
}

/// The `rel="next"` target of a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim() == r#"rel="next""#)
            .then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

fn iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Deserialize)]
struct ApiMilestone {
    title: String,
}

#[derive(Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    name: String,
}

/// Fields the issue and pull request payloads share.
#[derive(Deserialize)]
struct ApiCommon {
    number: u64,
    title: String,
    state: String,
    body: Option<String>,
    user: Option<ApiUser>,
    #[serde(default)]
    assignees: Vec<ApiUser>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    comments: u32,
    #[serde(default)]
    locked: bool,
    active_lock_reason: Option<String>,
    milestone: Option<ApiMilestone>,
}

impl ApiCommon {
    fn into_fields(self) -> ItemFields {
        ItemFields {
            number: self.number,
            state: if self.state.eq_ignore_ascii_case("closed") {
                ItemState::Closed
            } else {
                ItemState::Open
            },
            title: self.title,
            body: self.body.filter(|b| !b.is_empty()),
            author: self.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
            assignees: self.assignees.into_iter().map(|u| u.login).collect(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            url: self.html_url,
            comments: self.comments,
            locked: self.locked,
            lock_reason: self.active_lock_reason,
            milestone: self.milestone.map(|m| m.title),
        }
    }
}

#[derive(Deserialize)]
struct ApiIssue {
    #[serde(flatten)]
    common: ApiCommon,
    /// Present when the "issue" is a pull request.
    pull_request: Option<serde_json::Value>,
}

impl ApiIssue {
    fn into_fields(self) -> ItemFields {
        self.common.into_fields()
    }
}

#[derive(Deserialize)]
struct ApiPull {
    #[serde(flatten)]
    common: ApiCommon,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    draft: bool,
    base: ApiBranch,
    head: ApiBranch,
    #[serde(default)]
    requested_reviewers: Vec<ApiUser>,
}

impl ApiPull {
    fn into_pull_request(self) -> PullRequest {
        let mut pr = PullRequest::new(self.common.into_fields());
        pr.merged = self.merged_at.is_some();
        pr.merged_at = self.merged_at;
        pr.mergeable = self.mergeable;
        pr.draft = self.draft;
        pr.base_branch = self.base.name;
        pr.head_branch = self.head.name;
        pr.requested_reviewers = self.requested_reviewers.into_iter().map(|u| u.login).collect();
        pr
    }
}

#[derive(Deserialize)]
struct ApiMergeState {
    mergeable: Option<bool>,
}

#[derive(Deserialize)]
struct ApiComment {
    user: Option<ApiUser>,
    body: Option<String>,
    created_at: DateTime<Utc>,
    path: Option<String>,
}

impl ApiComment {
    fn into_comment(self, review: bool) -> Comment {
        Comment {
            author: self.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
            kind: if review {
                CommentKind::Review { path: self.path }
            } else {
                CommentKind::General
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    const PULL_LIST: &str = r#"[{
        "number": 12, "title": "Faster saves", "state": "open", "body": "x",
        "user": {"login": "octo"}, "created_at": "2024-03-01T12:00:00Z",
        "updated_at": "2024-03-03T12:00:00Z", "closed_at": null, "merged_at": null,
        "draft": false, "base": {"ref": "main"}, "head": {"ref": "perf/saves"}
    }]"#;

    /// Serve `count` single-request connections; detail requests for #12
    /// get a merge state, anything else the pull listing. Returns the base
    /// URL and a handle yielding the requested paths.
    fn serve_pulls(count: usize) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = std::thread::spawn(move || {
            let mut paths = Vec::new();
            for _ in 0..count {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone"));
                let mut request_line = String::new();
                reader.read_line(&mut request_line).expect("request line");
                loop {
                    let mut header = String::new();
                    let n = reader.read_line(&mut header).expect("header");
                    if n == 0 || header == "\r\n" {
                        break;
                    }
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or_default().to_string();
                let body = if path == "/repos/acme/widgets/pulls/12" {
                    r#"{"number": 12, "mergeable": true}"#
                } else {
                    PULL_LIST
                };
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .expect("response");
                paths.push(path);
            }
            paths
        });
        (url, handle)
    }

    #[test]
    fn next_link_is_found_among_relations() {
        let header = r#"<https://api.github.com/repositories/1/issues?page=2>; rel="next", <https://api.github.com/repositories/1/issues?page=5>; rel="last""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://api.github.com/repositories/1/issues?page=2")
        );
        let last_page = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="prev""#;
        assert_eq!(next_link(last_page), None);
    }

    #[test]
    fn issue_payload_maps_to_fields() {
        let raw = r#"{
            "number": 7, "title": "Crash on save", "state": "closed", "body": "",
            "user": {"login": "octo"}, "assignees": [{"login": "ada"}],
            "labels": [{"name": "bug"}], "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-02T12:00:00Z", "closed_at": "2024-03-02T12:00:00Z",
            "html_url": "https://github.com/acme/widgets/issues/7", "comments": 2,
            "locked": false, "active_lock_reason": null, "milestone": {"title": "v1"}
        }"#;
        let issue: ApiIssue = serde_json::from_str(raw).expect("decode");
        assert!(issue.pull_request.is_none());
        let fields = issue.into_fields();
        assert_eq!(fields.state, ItemState::Closed);
        assert_eq!(fields.body, None);
        assert_eq!(fields.labels, vec!["bug".to_string()]);
        assert_eq!(fields.assignees, vec!["ada".to_string()]);
        assert_eq!(fields.milestone.as_deref(), Some("v1"));
        assert_eq!(fields.comments, 2);
    }

    #[test]
    fn pull_payload_maps_branches_and_merge_state() {
        let raw = r#"{
            "number": 12, "title": "Faster saves", "state": "closed", "body": "x",
            "user": null, "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-03T12:00:00Z", "closed_at": "2024-03-03T12:00:00Z",
            "merged_at": "2024-03-03T12:00:00Z", "draft": false,
            "base": {"ref": "main"}, "head": {"ref": "perf/saves"},
            "requested_reviewers": [{"login": "ada"}]
        }"#;
        let pull: ApiPull = serde_json::from_str(raw).expect("decode");
        let pr = pull.into_pull_request();
        assert!(pr.merged);
        assert_eq!(pr.fields.author, "ghost");
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.head_branch, "perf/saves");
        assert_eq!(pr.requested_reviewers, vec!["ada".to_string()]);
    }

    #[test]
    fn review_comments_keep_their_path() {
        let raw = r#"{"user": {"login": "ada"}, "body": "nit", "created_at": "2024-03-01T12:00:00Z", "path": "src/lib.rs"}"#;
        let comment: ApiComment = serde_json::from_str(raw).expect("decode");
        let comment = comment.into_comment(true);
        assert_eq!(comment.kind, CommentKind::Review { path: Some("src/lib.rs".into()) });
    }

    #[test]
    fn open_pulls_fetch_their_merge_state() {
        let (url, server) = serve_pulls(2);
        let source = GithubSource::new(url, None);
        let repo = RepoId::parse("acme/widgets").unwrap();

        let items = source.list_items(&repo, ItemKind::PullRequest, ItemQuery::Open).expect("list");
        let pr = items[0].as_pull_request().expect("pull request");
        assert_eq!(pr.mergeable, Some(true));

        let paths = server.join().expect("server");
        assert!(paths[0].starts_with("/repos/acme/widgets/pulls?state=open"), "{paths:?}");
        assert_eq!(paths[1], "/repos/acme/widgets/pulls/12");
    }
}
