//! Resource name formatting and parsing.
//!
//! Names are slash-separated `collection/id` pairs, e.g.
//! `projects/p1/releases/r1/files/f1`.

use crate::error::{CoreError, CoreResult};

pub fn format_task_run(
    project_id: &str,
    pipeline_uid: i64,
    stage_id: i64,
    task_uid: i64,
    task_run_uid: i64,
) -> String {
    format!(
        "projects/{project_id}/rollouts/{pipeline_uid}/stages/{stage_id}/tasks/{task_uid}/taskRuns/{task_run_uid}"
    )
}

pub fn format_sheet(project_id: &str, sheet_uid: i64) -> String {
    format!("projects/{project_id}/sheets/{sheet_uid}")
}

pub fn format_issue(project_id: &str, issue_uid: i64) -> String {
    format!("projects/{project_id}/issues/{issue_uid}")
}

pub fn format_release(project_id: &str, release_id: &str) -> String {
    format!("projects/{project_id}/releases/{release_id}")
}

pub fn format_changelog(instance_id: &str, database_name: &str, changelog_uid: i64) -> String {
    format!("instances/{instance_id}/databases/{database_name}/changelogs/{changelog_uid}")
}

/// Identifiers of a release file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFileName {
    pub project_id: String,
    pub release_id: String,
    pub file_id: String,
}

/// Parse `projects/{project}/releases/{release}/files/{file}`.
pub fn parse_release_file(name: &str) -> CoreResult<ReleaseFileName> {
    let ids = parse_segments(name, &["projects", "releases", "files"])?;
    Ok(ReleaseFileName {
        project_id: ids[0].to_string(),
        release_id: ids[1].to_string(),
        file_id: ids[2].to_string(),
    })
}

/// Split `name` into ids, checking each collection keyword in order.
fn parse_segments<'a>(name: &'a str, collections: &[&str]) -> CoreResult<Vec<&'a str>> {
    let invalid = |reason: String| CoreError::InvalidResourceName {
        name: name.to_string(),
        reason,
    };

    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() != collections.len() * 2 {
        return Err(invalid(format!(
            "expected {} segments, found {}",
            collections.len() * 2,
            parts.len()
        )));
    }

    let mut ids = Vec::with_capacity(collections.len());
    for (pair, expected) in parts.chunks(2).zip(collections) {
        if pair[0] != *expected {
            return Err(invalid(format!("expected '{expected}', found '{}'", pair[0])));
        }
        if pair[1].is_empty() {
            return Err(invalid(format!("empty id after '{expected}'")));
        }
        ids.push(pair[1]);
    }
    Ok(ids)
}
