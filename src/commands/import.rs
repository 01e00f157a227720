use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{ImportArgs, resolve_db_path};
use crate::content::{
    ContentNode, ContentRow, OverlayDiff, Reconstruction, build_tree, overlay_between,
    validate_rows,
};
use crate::model::{ImportCounts, ImportPaths, ImportRunManifest, SourceFile};
use crate::store;
use crate::util::{
    ensure_directory, now_utc_string, read_json, sha256_file, utc_compact_string,
    utc_rfc3339_string, write_json_pretty,
};

#[cfg(test)]
mod tests;

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("import-{}", utc_compact_string(started_ts));
    let source = args.source.as_str();

    let manifest_dir = args.data_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("import_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_deref());

    info!(
        run_id = %run_id,
        source,
        version_id = %args.version_id,
        rows = %args.rows.display(),
        "starting import"
    );

    let mut counts = ImportCounts::default();
    let mut warnings = Vec::new();
    let mut source_files = vec![SourceFile {
        role: "rows".to_string(),
        path: args.rows.display().to_string(),
        sha256: sha256_file(&args.rows)?,
    }];

    let rows: Vec<ContentRow> = read_json(&args.rows)?;
    counts.rows_read = rows.len();
    let nodes = validate_rows(rows)
        .with_context(|| format!("malformed content rows in {}", args.rows.display()))?;

    check_shape(&nodes, &mut counts, &mut warnings)?;

    let mut connection = store::open_writable(&db_path)?;
    counts.rows_stored =
        store::replace_version_rows(&mut connection, source, &args.version_id, &nodes)?;
    info!(
        version_id = %args.version_id,
        rows = counts.rows_stored,
        "stored content rows"
    );

    if let Some(revised_path) = &args.revised {
        let diff_version_id = args
            .diff_version_id
            .as_deref()
            .context("--diff-version-id is required with --revised")?;

        source_files.push(SourceFile {
            role: "revised".to_string(),
            path: revised_path.display().to_string(),
            sha256: sha256_file(revised_path)?,
        });

        let revised_rows: Vec<ContentRow> = read_json(revised_path)?;
        counts.revised_rows_read = revised_rows.len();
        let revised = validate_rows(revised_rows).with_context(|| {
            format!("malformed revised content rows in {}", revised_path.display())
        })?;

        let OverlayDiff { overlay, unmatched } = overlay_between(&nodes, &revised);
        counts.overlay_patches_stored =
            store::replace_overlay(&mut connection, source, diff_version_id, &overlay)?;
        counts.unmatched_revised_rows = unmatched.len();

        if !unmatched.is_empty() {
            let preview = unmatched
                .iter()
                .take(10)
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(", ");
            warnings.push(format!(
                "{} revised rows have no base counterpart and were not overlaid: {preview}",
                unmatched.len()
            ));
        }

        info!(
            diff_version_id,
            patches = counts.overlay_patches_stored,
            unmatched = counts.unmatched_revised_rows,
            "stored diff overlay"
        );
    }

    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: store::DB_SCHEMA_VERSION.to_string(),
        started_at: utc_rfc3339_string(started_ts),
        completed_at: now_utc_string(),
        source: source.to_string(),
        version_id: args.version_id.clone(),
        diff_version_id: args.diff_version_id.clone(),
        command: std::env::args().collect::<Vec<String>>().join(" "),
        paths: ImportPaths {
            data_root: args.data_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts,
        source_files,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote import manifest");
    for warning in &manifest.warnings {
        warn!(warning = %warning, "import warning");
    }

    Ok(())
}

/// Builds the tree once so structural problems land in the manifest.
fn check_shape(
    nodes: &[ContentNode],
    counts: &mut ImportCounts,
    warnings: &mut Vec<String>,
) -> Result<()> {
    match build_tree(nodes.to_vec())? {
        Reconstruction::Empty => {
            warnings.push("rows file contained no content rows".to_string());
        }
        Reconstruction::Tree(tree) => {
            counts.root_children = tree.root.children.len();
            counts.detached_subtrees = tree.detached.len();
            if !tree.detached.is_empty() {
                warnings.push(format!(
                    "{} subtrees could not be attached to root {}",
                    tree.detached.len(),
                    tree.root.id
                ));
            }
        }
    }
    Ok(())
}
