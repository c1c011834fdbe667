//! Init command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, InitArgs};
use crate::commands::common::{load_workspace, open_store, sync_catalog};

/// Execute the init command
pub async fn execute(args: &InitArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let config = &workspace.config;

    if args.dry_run {
        println!("Dry run - catalog of workspace '{}':", config.name);
        println!("  Store: {}", workspace.store_path());
        for instance in &config.instances {
            println!(
                "  Instance {} ({}): {}",
                instance.id, instance.engine, instance.data_source
            );
        }
        for db in &config.databases {
            println!("  Database {}/{} (project {})", db.instance, db.name, db.project);
        }
        return Ok(());
    }

    let store = open_store(&workspace)?;
    let summary = sync_catalog(&store, &workspace)?;
    log::debug!("Catalog synced: {:?}", summary);

    println!("Initialized workspace '{}'", config.name);
    println!("  Store: {}", workspace.store_path());
    println!(
        "  {} environment(s), {} project(s), {} instance(s), {} database(s)",
        summary.environments, summary.projects, summary.instances, summary.databases
    );
    Ok(())
}
