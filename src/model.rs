use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    pub role: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPaths {
    pub data_root: String,
    pub manifest_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportCounts {
    pub rows_read: usize,
    pub rows_stored: usize,
    pub root_children: usize,
    pub detached_subtrees: usize,
    pub revised_rows_read: usize,
    pub overlay_patches_stored: usize,
    pub unmatched_revised_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub started_at: String,
    pub completed_at: String,
    pub source: String,
    pub version_id: String,
    pub diff_version_id: Option<String>,
    pub command: String,
    pub paths: ImportPaths,
    pub counts: ImportCounts,
    pub source_files: Vec<SourceFile>,
    pub warnings: Vec<String>,
}
