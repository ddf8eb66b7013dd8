//! Label and assignee filters applied to the open item set.
//!
//! Both filters are disabled by default. When both are enabled an item must
//! pass the label filter and then the assignee filter. Comparisons are
//! case-insensitive. An enabled filter with an empty value list keeps
//! everything.

use issuemirror_core::{AssigneeFilter, AssigneeFilterMode, LabelFilter, LabelFilterMode, RemoteItem};

/// Keep the items that pass both filters. `current_user` is only consulted
/// for [`AssigneeFilterMode::AssignedToMe`].
pub fn apply(
    items: Vec<RemoteItem>,
    labels: &LabelFilter,
    assignees: &AssigneeFilter,
    current_user: Option<&str>,
) -> Vec<RemoteItem> {
    items
        .into_iter()
        .filter(|item| label_matches(item, labels))
        .filter(|item| assignee_matches(item, assignees, current_user))
        .collect()
}

pub fn label_matches(item: &RemoteItem, filter: &LabelFilter) -> bool {
    if !filter.enabled || filter.labels.is_empty() {
        return true;
    }
    let hit = item
        .fields()
        .labels
        .iter()
        .any(|label| contains_ignore_case(&filter.labels, label));
    match filter.mode {
        LabelFilterMode::Include => hit,
        LabelFilterMode::Exclude => !hit,
    }
}

pub fn assignee_matches(
    item: &RemoteItem,
    filter: &AssigneeFilter,
    current_user: Option<&str>,
) -> bool {
    if !filter.enabled {
        return true;
    }
    let assigned = &item.fields().assignees;
    match filter.mode {
        AssigneeFilterMode::Unassigned => assigned.is_empty(),
        AssigneeFilterMode::AnyAssigned => !assigned.is_empty(),
        AssigneeFilterMode::AssignedToMe => match current_user {
            Some(me) => assigned.iter().any(|a| a.eq_ignore_ascii_case(me)),
            None => false,
        },
        AssigneeFilterMode::AssignedToSpecific => {
            filter.users.is_empty()
                || assigned.iter().any(|a| contains_ignore_case(&filter.users, a))
        }
    }
}

fn contains_ignore_case(set: &[String], value: &str) -> bool {
    set.iter().any(|s| s.trim().eq_ignore_ascii_case(value.trim()))
}
