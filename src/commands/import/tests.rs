use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{Value, json};

use super::*;
use crate::cli::{Cli, Commands, DEFAULT_DB_FILE, RenderArgs};
use crate::commands::render::render_to;

fn scratch_root(label: &str) -> PathBuf {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let root = std::env::temp_dir().join(format!(
        "congressdev_{label}_{}_{stamp}",
        std::process::id()
    ));
    fs::create_dir_all(&root).expect("scratch dir should be created");
    root
}

fn write_rows(path: &Path, rows: Value) {
    write_json_pretty(path, &rows).expect("rows file should be written");
}

fn import_args(argv: &[&str]) -> ImportArgs {
    let argv = ["congressdev", "import"].into_iter().chain(argv.iter().copied());
    match Cli::try_parse_from(argv).expect("import args should parse").command {
        Commands::Import(args) => args,
        other => panic!("expected import command, got {other:?}"),
    }
}

fn render_args(argv: &[&str]) -> RenderArgs {
    let argv = ["congressdev", "render"].into_iter().chain(argv.iter().copied());
    match Cli::try_parse_from(argv).expect("render args should parse").command {
        Commands::Render(args) => args,
        other => panic!("expected render command, got {other:?}"),
    }
}

fn base_rows() -> Value {
    json!([
        {"id": 1, "content_type": "legis-body"},
        {"id": 2, "parent_id": 1, "order_number": 0, "section_display": "(a)", "body_text": "old text"},
        {"id": 3, "parent_id": 1, "order_number": 1, "body_text": "kept"},
        {"id": 4, "parent_id": 99, "order_number": 0, "body_text": "stray"}
    ])
}

fn revised_rows() -> Value {
    json!([
        {"id": 1, "content_type": "legis-body"},
        {"id": 2, "parent_id": 1, "order_number": 0, "section_display": "(a)", "body_text": "new text"},
        {"id": 4, "parent_id": 99, "order_number": 0, "body_text": "stray"},
        {"id": 5, "parent_id": 1, "order_number": 2, "body_text": "added later"}
    ])
}

#[test]
fn import_writes_manifest_with_counts_digests_and_warnings() {
    let root = scratch_root("import_manifest");
    let base_path = root.join("base.json");
    let revised_path = root.join("revised.json");
    let manifest_path = root.join("manifest.json");
    write_rows(&base_path, base_rows());
    write_rows(&revised_path, revised_rows());

    let data_root = root.join("data");
    run(import_args(&[
        "--data-root",
        data_root.to_str().expect("utf-8 path"),
        "--manifest-path",
        manifest_path.to_str().expect("utf-8 path"),
        "--source",
        "usc",
        "--version-id",
        "base",
        "--rows",
        base_path.to_str().expect("utf-8 path"),
        "--revised",
        revised_path.to_str().expect("utf-8 path"),
        "--diff-version-id",
        "next",
    ]))
    .expect("import should succeed");

    let manifest: Value = read_json(&manifest_path).expect("manifest should be readable");
    assert_eq!(manifest["manifest_version"], 1);
    assert_eq!(manifest["source"], "usc");
    assert_eq!(manifest["version_id"], "base");
    assert_eq!(manifest["diff_version_id"], "next");
    assert_eq!(manifest["db_schema_version"], store::DB_SCHEMA_VERSION);
    assert!(
        manifest["run_id"]
            .as_str()
            .is_some_and(|run_id| run_id.starts_with("import-"))
    );

    let counts = &manifest["counts"];
    assert_eq!(counts["rows_read"], 4);
    assert_eq!(counts["rows_stored"], 4);
    assert_eq!(counts["root_children"], 2);
    assert_eq!(counts["detached_subtrees"], 1);
    assert_eq!(counts["revised_rows_read"], 4);
    assert_eq!(counts["overlay_patches_stored"], 2, "row 2 changed, row 3 removed");
    assert_eq!(counts["unmatched_revised_rows"], 1);

    let source_files = manifest["source_files"]
        .as_array()
        .expect("source_files should be an array");
    assert_eq!(source_files.len(), 2);
    assert_eq!(source_files[0]["role"], "rows");
    assert_eq!(
        source_files[0]["sha256"],
        sha256_file(&base_path).expect("base digest")
    );
    assert_eq!(source_files[1]["role"], "revised");
    assert_eq!(
        source_files[1]["sha256"],
        sha256_file(&revised_path).expect("revised digest")
    );

    assert_eq!(
        manifest["warnings"],
        json!([
            "1 subtrees could not be attached to root 1",
            "1 revised rows have no base counterpart and were not overlaid: 5"
        ])
    );

    assert!(data_root.join(DEFAULT_DB_FILE).is_file());
    assert!(data_root.join("manifests").is_dir());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn imported_versions_render_with_stored_overlay() {
    let root = scratch_root("import_render");
    let base_path = root.join("base.json");
    let revised_path = root.join("revised.json");
    write_rows(&base_path, base_rows());
    write_rows(&revised_path, revised_rows());

    let data_root = root.join("data");
    let data_root_arg = data_root.to_str().expect("utf-8 path");
    run(import_args(&[
        "--data-root",
        data_root_arg,
        "--source",
        "usc",
        "--version-id",
        "base",
        "--rows",
        base_path.to_str().expect("utf-8 path"),
        "--revised",
        revised_path.to_str().expect("utf-8 path"),
        "--diff-version-id",
        "next",
    ]))
    .expect("import should succeed");

    let mut json_output = Vec::new();
    render_to(
        &render_args(&[
            "--data-root",
            data_root_arg,
            "--version-id",
            "base",
            "--diff-version-id",
            "next",
            "--json",
        ]),
        &mut json_output,
    )
    .expect("json render should succeed");

    let response: Value =
        serde_json::from_slice(&json_output).expect("render output should be json");
    assert_eq!(response["source"], "usc");
    assert_eq!(response["version_id"], "base");
    assert_eq!(response["diff_version_id"], "next");
    assert_eq!(response["overlay_patches"], 2);
    assert_eq!(response["node_count"], 4);
    assert_eq!(response["detached_count"], 1);

    let changed = &response["tree"]["root"]["children"][0];
    assert_eq!(changed["id"], 2);
    assert_eq!(changed["body_text"], "new text");
    assert_eq!(
        changed["body_spans"],
        json!([
            {"tag": "removed", "text": "old"},
            {"tag": "added", "text": "new"},
            {"tag": "unchanged", "text": " text"}
        ])
    );
    let removed = &response["tree"]["root"]["children"][1];
    assert_eq!(removed["id"], 3);
    assert!(removed.get("body_text").is_none());

    let mut text_output = Vec::new();
    render_to(
        &render_args(&[
            "--data-root",
            data_root_arg,
            "--version-id",
            "base",
            "--diff-version-id",
            "next",
        ]),
        &mut text_output,
    )
    .expect("text render should succeed");
    let text = String::from_utf8(text_output).expect("text output should be utf-8");
    assert_eq!(text, "(a) [-old-]{+new+} text\n[-kept-]\n-- detached --\nstray\n");

    fs::remove_dir_all(&root).ok();
}

#[test]
fn import_of_empty_rows_warns_and_stores_nothing() {
    let root = scratch_root("import_empty");
    let rows_path = root.join("empty.json");
    let manifest_path = root.join("manifest.json");
    write_rows(&rows_path, json!([]));

    run(import_args(&[
        "--data-root",
        root.join("data").to_str().expect("utf-8 path"),
        "--manifest-path",
        manifest_path.to_str().expect("utf-8 path"),
        "--source",
        "legislation",
        "--version-id",
        "7",
        "--rows",
        rows_path.to_str().expect("utf-8 path"),
    ]))
    .expect("empty import should succeed");

    let manifest: Value = read_json(&manifest_path).expect("manifest should be readable");
    assert_eq!(manifest["counts"]["rows_read"], 0);
    assert_eq!(manifest["counts"]["rows_stored"], 0);
    assert!(manifest["diff_version_id"].is_null());
    assert_eq!(manifest["source_files"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        manifest["warnings"],
        json!(["rows file contained no content rows"])
    );

    fs::remove_dir_all(&root).ok();
}

#[test]
fn import_rejects_rows_without_ids() {
    let root = scratch_root("import_malformed");
    let rows_path = root.join("bad.json");
    write_rows(&rows_path, json!([{"id": 1}, {"parent_id": 1, "body_text": "no id"}]));

    let err = run(import_args(&[
        "--data-root",
        root.join("data").to_str().expect("utf-8 path"),
        "--source",
        "usc",
        "--version-id",
        "1",
        "--rows",
        rows_path.to_str().expect("utf-8 path"),
    ]))
    .expect_err("row without id should fail the import");
    assert!(
        format!("{err:#}").contains("content row at index 1 has no id"),
        "unexpected error: {err:#}"
    );

    fs::remove_dir_all(&root).ok();
}
