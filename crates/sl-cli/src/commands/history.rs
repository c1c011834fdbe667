//! History command implementation

use anyhow::Result;
use sl_core::resource_name::format_changelog;

use crate::cli::{GlobalArgs, TargetArgs};
use crate::commands::common::{find_target, load_workspace, open_store};

/// Execute the history command
pub async fn execute(args: &TargetArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let store = open_store(&workspace)?;
    let (instance, database) = find_target(&store, args)?;

    let changelogs = store.list_changelogs(database.uid)?;
    if changelogs.is_empty() {
        println!("No changelogs for {}/{}", instance.resource_id, database.database_name);
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<14} {:<16} {:<10} TASK RUN",
        "UID", "STATUS", "TYPE", "VERSION", "REVISION"
    );
    for changelog in &changelogs {
        let payload = &changelog.payload;
        println!(
            "{:<8} {:<8} {:<14} {:<16} {:<10} {}",
            changelog.uid,
            changelog.status.as_str(),
            payload.change_type.as_str(),
            if payload.version.is_empty() { "-" } else { payload.version.as_str() },
            changelog
                .revision_uid
                .map(|uid| uid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            payload.task_run
        );
    }

    if global.verbose {
        println!();
        for changelog in &changelogs {
            println!(
                "{}",
                format_changelog(&instance.resource_id, &database.database_name, changelog.uid)
            );
        }
    }
    Ok(())
}
