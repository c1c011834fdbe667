//! Revisions command implementation

use anyhow::Result;
use sl_store::{FindRevision, Store};

use crate::cli::{GlobalArgs, TargetArgs};
use crate::commands::common::{find_target, load_workspace, open_store};

/// Execute the revisions command
pub async fn execute(args: &TargetArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let store = open_store(&workspace)?;
    let (instance, database) = find_target(&store, args)?;

    let revisions = store
        .list_revisions(&FindRevision {
            database_uid: database.uid,
            version: None,
        })
        .await?;
    if revisions.is_empty() {
        println!(
            "No versions applied to {}/{}",
            instance.resource_id, database.database_name
        );
        return Ok(());
    }

    println!("{:<16} {:<8} SOURCE", "VERSION", "UID");
    for revision in &revisions {
        let payload = &revision.payload;
        let source = if !payload.file.is_empty() {
            payload.file.as_str()
        } else if !payload.sheet.is_empty() {
            payload.sheet.as_str()
        } else {
            "-"
        };
        println!("{:<16} {:<8} {}", revision.version, revision.uid, source);
    }
    Ok(())
}
