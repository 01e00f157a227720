use rusqlite::Connection;

use super::*;
use crate::content::{Reconstruction, reconstruct, validate_rows};

fn memory_store() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory DB should open");
    ensure_schema(&connection).expect("schema should apply");
    connection
}

fn sample_nodes() -> Vec<ContentNode> {
    let raw = r#"
    [
      {"id": 10, "parent_id": 1, "order_number": 1, "section_display": "(b)", "body_text": "second"},
      {"id": 1, "content_type": "legis-body"},
      {"id": 11, "parent_id": 1, "order_number": 0, "section_display": "(a)", "body_text": "first"},
      {"id": "note", "parent_id": 11, "order_number": 0, "heading_text": "Note"}
    ]
    "#;
    let rows: Vec<ContentRow> = serde_json::from_str(raw).expect("sample rows should parse");
    validate_rows(rows).expect("sample rows should be valid")
}

#[test]
fn ensure_schema_is_idempotent_and_records_version() {
    let connection = memory_store();
    ensure_schema(&connection).expect("second schema pass should succeed");

    let version = metadata_value(&connection, "db_schema_version").expect("metadata query");
    assert_eq!(version.as_deref(), Some(DB_SCHEMA_VERSION));
    assert!(
        metadata_value(&connection, "missing_key")
            .expect("metadata query")
            .is_none()
    );
}

#[test]
fn stored_rows_reconstruct_into_the_same_tree() {
    let mut connection = memory_store();
    let nodes = sample_nodes();

    let inserted = replace_version_rows(&mut connection, "usc", "42", &nodes)
        .expect("rows should store");
    assert_eq!(inserted, 4);

    let rows = load_version_rows(&connection, "usc", "42").expect("rows should load");
    assert_eq!(rows.len(), 4);

    let tree = match reconstruct(rows).expect("stored rows are well formed") {
        Reconstruction::Tree(tree) => tree,
        Reconstruction::Empty => panic!("stored version should not be empty"),
    };
    assert_eq!(tree.root.id, NodeId::Int(1));
    assert_eq!(tree.root.content_type, "legis-body");
    assert_eq!(tree.root.children[0].id, NodeId::Int(11));
    assert_eq!(tree.root.children[1].id, NodeId::Int(10));
    assert_eq!(tree.root.children[0].children[0].id, NodeId::Text("note".to_string()));
    assert_eq!(
        tree.root.children[0].section_display.as_deref(),
        Some("(a)")
    );
}

#[test]
fn replacing_a_version_drops_previous_rows_only_for_that_version() {
    let mut connection = memory_store();
    let nodes = sample_nodes();

    replace_version_rows(&mut connection, "usc", "42", &nodes).expect("first import");
    replace_version_rows(&mut connection, "legislation", "42", &nodes).expect("other source");
    replace_version_rows(&mut connection, "usc", "42", &nodes[..2]).expect("re-import");

    assert_eq!(
        load_version_rows(&connection, "usc", "42")
            .expect("rows should load")
            .len(),
        2
    );
    assert_eq!(
        load_version_rows(&connection, "legislation", "42")
            .expect("rows should load")
            .len(),
        4
    );
    assert!(
        load_version_rows(&connection, "usc", "7")
            .expect("rows should load")
            .is_empty()
    );

    let summaries = version_summaries(&connection).expect("summaries should load");
    assert_eq!(
        summaries,
        vec![
            VersionSummary {
                source: "legislation".to_string(),
                version_id: "42".to_string(),
                rows: 4,
            },
            VersionSummary {
                source: "usc".to_string(),
                version_id: "42".to_string(),
                rows: 2,
            },
        ]
    );
}

#[test]
fn overlay_round_trips_through_storage() {
    let mut connection = memory_store();
    let overlay: DiffOverlay = [
        (
            NodeId::Int(10),
            FieldPatch {
                heading_text: None,
                body_text: Some("second, amended".to_string()),
            },
        ),
        (
            NodeId::Text("note".to_string()),
            FieldPatch {
                heading_text: Some(String::new()),
                body_text: None,
            },
        ),
        (NodeId::Int(11), FieldPatch::default()),
    ]
    .into_iter()
    .collect();

    let stored = replace_overlay(&mut connection, "usc", "43", &overlay).expect("overlay stores");
    assert_eq!(stored, 2, "empty patches are not stored");

    let loaded = load_overlay(&connection, "usc", "43").expect("overlay loads");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get(&NodeId::Int(10)), overlay.get(&NodeId::Int(10)));
    assert_eq!(
        loaded.get(&NodeId::Text("note".to_string())),
        overlay.get(&NodeId::Text("note".to_string()))
    );

    let summaries = overlay_summaries(&connection).expect("summaries should load");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].version_id, "43");
    assert_eq!(summaries[0].rows, 2);
}

#[test]
fn null_content_id_surfaces_as_malformed_record() {
    let connection = Connection::open_in_memory().expect("in-memory DB should open");
    connection
        .execute_batch(
            "
            CREATE TABLE content_rows (
              source TEXT, version_id TEXT, content_id, parent_id,
              order_number REAL, section_display TEXT, heading TEXT,
              content_str TEXT, content_type TEXT
            );
            INSERT INTO content_rows VALUES ('usc', '1', 1, NULL, 0, NULL, NULL, 'root', NULL);
            INSERT INTO content_rows VALUES ('usc', '1', NULL, 1, 1, NULL, NULL, 'lost', NULL);
            ",
        )
        .expect("legacy rows should insert");

    let rows = load_version_rows(&connection, "usc", "1").expect("rows should load");
    let err = reconstruct(rows).expect_err("row without id should fail");
    assert!(err.to_string().contains("has no id"), "unexpected error: {err}");
}
