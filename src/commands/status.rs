use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{StatusArgs, resolve_db_path};
use crate::store;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_deref());
    let manifest_dir = args.data_root.join("manifests");

    info!(data_root = %args.data_root.display(), "status requested");

    if manifest_dir.exists() {
        let manifests = std::fs::read_dir(&manifest_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("import_run_"))
            })
            .count();
        info!(path = %manifest_dir.display(), import_manifests = manifests, "manifest directory");
    } else {
        warn!(path = %manifest_dir.display(), "manifest directory missing");
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = store::open_read_only(&db_path)?;
    let schema_version = store::metadata_value(&connection, "db_schema_version")?;
    let updated_at = store::metadata_value(&connection, "db_updated_at")?;

    info!(
        path = %db_path.display(),
        schema_version = %schema_version.unwrap_or_default(),
        updated_at = %updated_at.unwrap_or_default(),
        "database status"
    );

    for summary in store::version_summaries(&connection)? {
        info!(
            source = %summary.source,
            version_id = %summary.version_id,
            rows = summary.rows,
            "content version"
        );
    }

    for summary in store::overlay_summaries(&connection)? {
        info!(
            source = %summary.source,
            diff_version_id = %summary.version_id,
            patches = summary.rows,
            "diff overlay"
        );
    }

    Ok(())
}
