//! End-to-end reconciliation passes against a temporary vault.

mod common;

use std::fs;
use std::path::Path;

use common::*;
use issuemirror_core::{Comment, CommentKind, LabelFilterMode, RemoteItem, UpdateMode};
use issuemirror_sync::diff::unified_diffs;
use issuemirror_sync::NoticeAction;
use rstest::rstest;
use tempfile::TempDir;

const REPO: &str = "acme/widgets";

fn with_body(mut item: RemoteItem, body: &str) -> RemoteItem {
    if let RemoteItem::Issue(issue) = &mut item {
        issue.fields.body = Some(body.to_string());
    }
    item
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("document")
}

// ---------------------------------------------------------------------------
// Open items
// ---------------------------------------------------------------------------

#[test]
fn first_pass_creates_and_second_pass_is_idle() {
    init_logging();
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.update_mode = UpdateMode::Update;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![with_body(issue(7, "Crash on save", days_ago(2)), "Steps to reproduce")]);

    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Created), 1, "{report:?}");

    let doc = read(&issue_path(vault.path(), REPO, 7));
    assert!(doc.starts_with("---\nnumber: 7\n"), "{doc}");
    assert!(doc.contains("repository: \"acme/widgets\""));
    assert!(doc.contains("updateMode: \"update\""));
    assert!(doc.contains("# Crash on save"));
    assert!(doc.contains("Steps to reproduce"));

    let again = pass(&config, &remote);
    assert_eq!(again.writes(), 0, "{again:?}");
    assert_eq!(again.count(NoticeAction::Skipped), 1);
    assert_eq!(read(&issue_path(vault.path(), REPO, 7)), doc);
}

#[test]
fn update_keeps_persist_block_content() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.update_mode = UpdateMode::Update;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    pass(&config, &remote);

    let path = issue_path(vault.path(), REPO, 7);
    let edited = read(&path).replace(
        "{% persist \"notes\" %}\n{% endpersist %}",
        "{% persist \"notes\" %}\nremember the workaround\n{% endpersist %}",
    );
    assert!(edited.contains("remember the workaround"));
    fs::write(&path, &edited).unwrap();

    remote.set(REPO, vec![issue(7, "Crash on save (regression)", days_ago(1))]);
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Updated), 1, "{report:?}");

    let doc = read(&path);
    assert!(doc.contains("# Crash on save (regression)"));
    assert!(doc.contains("remember the workaround"));
    assert_eq!(doc.matches("{% persist \"notes\" %}").count(), 1);
}

#[test]
fn update_mode_none_never_rewrites() {
    let vault = TempDir::new().unwrap();
    let config = config(vault.path(), &[REPO]);

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    pass(&config, &remote);
    let before = read(&issue_path(vault.path(), REPO, 7));

    remote.set(REPO, vec![issue(7, "Renamed", days_ago(1))]);
    let report = pass(&config, &remote);
    assert_eq!(report.writes(), 0);
    assert_eq!(read(&issue_path(vault.path(), REPO, 7)), before);
}

#[test]
fn header_update_mode_overrides_policy() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.update_mode = UpdateMode::Update;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    pass(&config, &remote);

    let path = issue_path(vault.path(), REPO, 7);
    let pinned = read(&path).replace("updateMode: \"update\"", "updateMode: \"none\"");
    fs::write(&path, &pinned).unwrap();

    remote.set(REPO, vec![issue(7, "Renamed", days_ago(1))]);
    let report = pass(&config, &remote);
    assert_eq!(report.writes(), 0, "{report:?}");
    assert_eq!(read(&path), pinned);
}

#[test]
fn append_adds_a_section_and_refreshes_the_header() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.update_mode = UpdateMode::Append;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    pass(&config, &remote);

    remote.set(REPO, vec![with_body(issue(7, "Crash on save", days_ago(1)), "still broken")]);
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Appended), 1, "{report:?}");

    let path = issue_path(vault.path(), REPO, 7);
    let doc = read(&path);
    assert_eq!(doc.matches("# Crash on save").count(), 1);
    assert!(doc.contains("## Update · 2024-05-31"), "{doc}");
    assert!(doc.contains("still broken"));
    assert!(doc.contains("updated: \"2024-05-31T12:00:00Z\""));

    let third = pass(&config, &remote);
    assert_eq!(third.writes(), 0, "{third:?}");
    assert_eq!(read(&path), doc);
}

// ---------------------------------------------------------------------------
// Leftover documents
// ---------------------------------------------------------------------------

#[rstest]
#[case::gone_from_history(40, 40, true, true)]
#[case::deletion_not_allowed(40, 40, false, false)]
#[case::closed_recently(10, 10, true, false)]
#[case::closed_recently_deletion_not_allowed(10, 10, false, false)]
#[case::closed_long_ago_touched_recently(40, 5, true, true)]
fn closed_items_follow_retention(
    #[case] closed_days: i64,
    #[case] updated_days: i64,
    #[case] allow_delete: bool,
    #[case] trashed: bool,
) {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.allow_delete = allow_delete;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(60))]);
    pass(&config, &remote);
    let path = issue_path(vault.path(), REPO, 7);
    assert!(path.exists());

    remote.set(
        REPO,
        vec![closed(issue(7, "Crash on save", days_ago(60)), days_ago(closed_days), days_ago(updated_days))],
    );
    let report = pass(&config, &remote);

    let in_trash = vault.path().join(".trash/GitHub Issues/acme/widgets/Issue - 7.md");
    assert_eq!(!path.exists(), trashed, "{report:?}");
    assert_eq!(in_trash.exists(), trashed);
    let expected = if trashed { NoticeAction::Deleted } else { NoticeAction::Kept };
    assert_eq!(report.count(expected), 1, "{report:?}");
}

#[test]
fn retention_window_past_the_calendar_keeps_closed_documents() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.allow_delete = true;
    config.settings.retention_days = u32::MAX;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(60))]);
    pass(&config, &remote);

    remote.set(REPO, vec![closed(issue(7, "Crash on save", days_ago(60)), days_ago(40), days_ago(40))]);
    let report = pass(&config, &remote);

    assert!(!report.has_errors(), "{report:?}");
    assert_eq!(report.count(NoticeAction::Kept), 1, "{report:?}");
    assert!(issue_path(vault.path(), REPO, 7).exists());
}

#[test]
fn item_filtered_out_is_no_longer_tracked() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.allow_delete = true;

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![with_labels(issue(7, "Crash on save", days_ago(2)), &["bug"])]);
    pass(&config, &remote);

    config.settings.issues.label_filter.enabled = true;
    config.settings.issues.label_filter.mode = LabelFilterMode::Exclude;
    config.settings.issues.label_filter.labels = vec!["bug".into()];
    let report = pass(&config, &remote);

    let deleted: Vec<_> = report
        .notices
        .iter()
        .filter(|n| n.action == NoticeAction::Deleted)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].message.starts_with("no longer tracked"));
}

#[rstest]
#[case::include(LabelFilterMode::Include, 1)]
#[case::exclude(LabelFilterMode::Exclude, 2)]
fn label_filter_selects_documents(#[case] mode: LabelFilterMode, #[case] kept: u64) {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.label_filter.enabled = true;
    config.settings.issues.label_filter.mode = mode;
    config.settings.issues.label_filter.labels = vec!["Bug".into()];

    let mut remote = FakeRemote::default();
    remote.set(
        REPO,
        vec![
            with_labels(issue(1, "A", days_ago(2)), &["bug"]),
            with_labels(issue(2, "B", days_ago(2)), &["docs"]),
        ],
    );
    let report = pass(&config, &remote);

    assert_eq!(report.count(NoticeAction::Created), 1);
    for number in [1, 2] {
        assert_eq!(issue_path(vault.path(), REPO, number).exists(), number == kept);
    }
}

#[rstest]
#[case::included(true, 1, true)]
#[case::excluded(false, 1, false)]
#[case::issue_without_comments_skips_fetch(true, 0, false)]
fn comments_follow_the_include_setting(
    #[case] include: bool,
    #[case] reported: u32,
    #[case] rendered: bool,
) {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.include_comments = include;

    let mut item = issue(7, "Crash on save", days_ago(2));
    if let RemoteItem::Issue(issue) = &mut item {
        issue.fields.comments = reported;
    }
    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![item]);
    remote.comments.insert(
        (REPO.to_string(), 7),
        vec![Comment {
            author: "hubot".into(),
            body: "Reproduced on 2.3.1".into(),
            created_at: days_ago(1),
            kind: CommentKind::General,
        }],
    );
    pass(&config, &remote);

    let doc = read(&issue_path(vault.path(), REPO, 7));
    assert_eq!(doc.contains("Reproduced on 2.3.1"), rendered, "{doc}");
    assert_eq!(doc.contains("## Comments"), rendered, "{doc}");
}

#[test]
fn empty_hierarchical_folders_are_removed_but_custom_folders_stay() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO, "acme/gadgets"]);
    config.settings.issues.allow_delete = true;
    config.repositories[1].issues.use_custom_folder = true;
    config.repositories[1].issues.custom_folder = "Inbox".into();

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(1, "A", days_ago(2))]);
    remote.set("acme/gadgets", vec![issue(2, "B", days_ago(2))]);
    pass(&config, &remote);
    assert!(issue_path(vault.path(), REPO, 1).exists());
    assert!(vault.path().join("Inbox/Issue - 2.md").exists());

    remote.set(REPO, Vec::new());
    remote.set("acme/gadgets", Vec::new());
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Deleted), 2, "{report:?}");

    assert!(!vault.path().join("GitHub Issues/acme").exists());
    assert!(vault.path().join("GitHub Issues").exists());
    assert!(vault.path().join("Inbox").is_dir());
}

#[test]
fn cleanup_only_touches_folders_of_processed_repositories() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO, "acme/gadgets"]);
    config.settings.issues.allow_delete = true;
    config.repositories[1].issues.use_custom_folder = true;
    config.repositories[1].issues.custom_folder = "GitHub Issues/shared/inbox".into();

    let untracked = vault.path().join("GitHub Issues/other/old");
    let custom = vault.path().join("GitHub Issues/shared/inbox");
    fs::create_dir_all(&untracked).unwrap();
    fs::create_dir_all(&custom).unwrap();

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(1, "A", days_ago(2))]);
    pass(&config, &remote);
    remote.set(REPO, Vec::new());
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Deleted), 1, "{report:?}");

    assert!(!vault.path().join("GitHub Issues/acme").exists());
    assert!(untracked.is_dir());
    assert!(custom.is_dir());
}

#[test]
fn shared_custom_folder_is_scoped_per_repository() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO, "acme/gadgets"]);
    config.settings.issues.allow_delete = true;
    for repo in &mut config.repositories {
        repo.issues.use_custom_folder = true;
        repo.issues.custom_folder = "Inbox".into();
        repo.issues.use_custom_template = true;
        repo.issues.filename_template = "{repo_name} - {number}".into();
    }

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(1, "Widget bug", days_ago(2))]);
    remote.set("acme/gadgets", vec![issue(1, "Gadget bug", days_ago(2))]);
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Created), 2, "{report:?}");

    remote.set("acme/gadgets", Vec::new());
    let report = pass(&config, &remote);
    assert_eq!(report.count(NoticeAction::Deleted), 1, "{report:?}");
    assert!(vault.path().join("Inbox/widgets - 1.md").exists());
    assert!(!vault.path().join("Inbox/gadgets - 1.md").exists());
}

#[test]
fn document_without_a_number_is_left_alone() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.allow_delete = true;

    let stray = vault.path().join("GitHub Issues/acme/widgets/meeting notes.md");
    fs::create_dir_all(stray.parent().unwrap()).unwrap();
    fs::write(&stray, "# Notes\n").unwrap();

    let report = pass(&config, &FakeRemote::default());
    assert_eq!(report.count(NoticeAction::Ignored), 1);
    assert_eq!(report.count(NoticeAction::Deleted), 0);
    assert!(stray.exists());
}

// ---------------------------------------------------------------------------
// Pass-level behaviour
// ---------------------------------------------------------------------------

#[test]
fn failing_repository_does_not_stop_the_pass() {
    let vault = TempDir::new().unwrap();
    let config = config(vault.path(), &[REPO, "acme/gadgets"]);

    let mut remote = FakeRemote::default();
    remote.failing.insert(REPO.to_string());
    remote.set("acme/gadgets", vec![issue(3, "C", days_ago(2))]);
    let report = pass(&config, &remote);

    assert!(report.has_errors());
    assert_eq!(report.count(NoticeAction::Error), 1);
    assert!(issue_path(vault.path(), "acme/gadgets", 3).exists());
}

#[test]
fn dry_run_writes_nothing_and_plans_diffs() {
    let vault = TempDir::new().unwrap();
    let config = config(vault.path(), &[REPO]);

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    let report = pass_with(&config, &remote, true);

    assert!(report.dry_run);
    assert_eq!(report.count(NoticeAction::Created), 1);
    assert!(!issue_path(vault.path(), REPO, 7).exists());
    assert!(!vault.path().join("GitHub Issues").exists());

    let diffs = unified_diffs(&report);
    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].unified_diff.contains("--- /dev/null"));
    assert!(diffs[0].unified_diff.contains("+# Crash on save"));
}

#[test]
fn custom_template_is_used_and_missing_one_falls_back() {
    let vault = TempDir::new().unwrap();
    let mut config = config(vault.path(), &[REPO]);
    config.settings.issues.use_custom_template = true;
    config.settings.issues.template_file = "templates/issue.md".into();

    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(7, "Crash on save", days_ago(2))]);
    pass(&config, &remote);
    let fallback = read(&issue_path(vault.path(), REPO, 7));
    assert!(fallback.contains("# Crash on save"));
    assert!(fallback.contains("## Notes"));

    fs::create_dir_all(vault.path().join("templates")).unwrap();
    fs::write(vault.path().join("templates/issue.md"), "Custom: {title} by {author}\n").unwrap();
    remote.set(REPO, vec![issue(8, "Slow start", days_ago(2))]);
    pass(&config, &remote);

    let custom = read(&issue_path(vault.path(), REPO, 8));
    assert!(custom.contains("Custom: Slow start by octo"), "{custom}");
    assert!(custom.contains("number: 8"));
}

#[test]
fn single_repository_scope() {
    let vault = TempDir::new().unwrap();
    let config = config(vault.path(), &[REPO, "acme/gadgets"]);
    let mut remote = FakeRemote::default();
    remote.set(REPO, vec![issue(1, "A", days_ago(2))]);
    remote.set("acme/gadgets", vec![issue(2, "B", days_ago(2))]);

    let idle = vault.path().join("GitHub Issues/acme/widgets");
    fs::create_dir_all(&idle).unwrap();

    let store = issuemirror_sync::FsStore::new(vault.path());
    let options = issuemirror_sync::SyncOptions {
        repository: Some("ACME/Gadgets".into()),
        now: Some(now()),
        ..Default::default()
    };
    let report = issuemirror_sync::SyncEngine::new(&config, &store, &remote)
        .run(&options)
        .expect("scoped pass");
    assert_eq!(report.count(NoticeAction::Created), 1);
    assert!(!issue_path(vault.path(), REPO, 1).exists());
    assert!(issue_path(vault.path(), "acme/gadgets", 2).exists());
    assert!(idle.is_dir(), "scoped pass must not sweep other repositories");

    let unknown = issuemirror_sync::SyncOptions {
        repository: Some("acme/unknown".into()),
        ..Default::default()
    };
    assert!(issuemirror_sync::SyncEngine::new(&config, &store, &remote).run(&unknown).is_err());
}
