use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::cli::{RenderArgs, resolve_db_path};
use crate::content::{
    ContentRow, ContentTree, DiffOverlay, OverlayEntry, Reconstruction, reconstruct,
    render_reconstruction,
};
use crate::store;
use crate::util::read_json;


/// Deepest tree JSON output will serialize. Text output has no limit.
pub const MAX_JSON_DEPTH: usize = 512;

#[derive(Debug, Serialize)]
struct RenderResponse<'a> {
    source: &'static str,
    version_id: Option<&'a str>,
    diff_version_id: Option<&'a str>,
    overlay_patches: usize,
    node_count: usize,
    detached_count: usize,
    tree: Option<&'a ContentTree>,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_to(&args, &mut output)?;
    output.flush()?;
    Ok(())
}

pub(crate) fn render_to<W: Write>(args: &RenderArgs, output: &mut W) -> Result<()> {
    let source = args.source.as_str();
    let needs_store = args.version_id.is_some() || args.diff_version_id.is_some();
    let connection = if needs_store {
        let db_path = resolve_db_path(&args.data_root, args.db_path.as_deref());
        Some(store::open_read_only(&db_path)?)
    } else {
        None
    };

    let rows = load_rows(args, connection.as_ref())?;
    let overlay = load_overlay(args, connection.as_ref())?;
    info!(
        source,
        rows = rows.len(),
        overlay_patches = overlay.len(),
        "rendering content"
    );

    let reconstruction = match reconstruct(rows).context("failed to reconstruct content tree")? {
        Reconstruction::Tree(tree) if !overlay.is_empty() => {
            Reconstruction::Tree(tree.with_overlay(&overlay))
        }
        other => other,
    };

    if args.json {
        let tree = match &reconstruction {
            Reconstruction::Tree(tree) => Some(tree),
            Reconstruction::Empty => None,
        };
        let depth = tree.map(ContentTree::max_depth).unwrap_or(0);
        if depth > MAX_JSON_DEPTH {
            bail!(
                "content tree is {depth} levels deep; json output supports at most \
                 {MAX_JSON_DEPTH}, render as text instead"
            );
        }
        let response = RenderResponse {
            source,
            version_id: args.version_id.as_deref(),
            diff_version_id: args.diff_version_id.as_deref(),
            overlay_patches: overlay.len(),
            node_count: tree.map(ContentTree::node_count).unwrap_or(0),
            detached_count: tree.map(|tree| tree.detached.len()).unwrap_or(0),
            tree,
        };
        serde_json::to_writer_pretty(&mut *output, &response)
            .context("failed to serialize render json output")?;
        writeln!(output)?;
    } else {
        output.write_all(render_reconstruction(&reconstruction).as_bytes())?;
    }

    Ok(())
}

fn load_rows(args: &RenderArgs, connection: Option<&Connection>) -> Result<Vec<ContentRow>> {
    if let Some(path) = &args.rows_file {
        return read_json(path);
    }

    match (&args.version_id, connection) {
        (Some(version_id), Some(connection)) => {
            store::load_version_rows(connection, args.source.as_str(), version_id)
        }
        _ => bail!("either --version-id or --rows-file is required"),
    }
}

fn load_overlay(args: &RenderArgs, connection: Option<&Connection>) -> Result<DiffOverlay> {
    if let Some(path) = &args.overlay_file {
        let entries: Vec<OverlayEntry> = read_json(path)?;
        return Ok(entries.into_iter().collect());
    }

    match (&args.diff_version_id, connection) {
        (Some(diff_version_id), Some(connection)) => {
            store::load_overlay(connection, args.source.as_str(), diff_version_id)
        }
        _ => Ok(DiffOverlay::new()),
    }
}
