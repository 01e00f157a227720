use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_DB_FILE: &str = "congress_dev.sqlite";

#[derive(Parser, Debug)]
#[command(
    name = "congressdev",
    version,
    about = "Legislation and U.S. Code content trees with version diffs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Render(RenderArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ContentSource {
    Legislation,
    Usc,
}

impl ContentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legislation => "legislation",
            Self::Usc => "usc",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = ".cache/congress-dev")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub source: ContentSource,

    #[arg(long)]
    pub version_id: String,

    /// JSON array of content rows for `--version-id`.
    #[arg(long)]
    pub rows: PathBuf,

    /// JSON array of the revised rows; stored as a diff overlay.
    #[arg(long, requires = "diff_version_id")]
    pub revised: Option<PathBuf>,

    #[arg(long, requires = "revised")]
    pub diff_version_id: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("content").required(true).args(["version_id", "rows_file"])))]
#[command(group(ArgGroup::new("diff").args(["diff_version_id", "overlay_file"])))]
pub struct RenderArgs {
    #[arg(long, default_value = ".cache/congress-dev")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ContentSource::Usc)]
    pub source: ContentSource,

    #[arg(long)]
    pub version_id: Option<String>,

    #[arg(long)]
    pub rows_file: Option<PathBuf>,

    #[arg(long)]
    pub diff_version_id: Option<String>,

    #[arg(long)]
    pub overlay_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/congress-dev")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub fn resolve_db_path(data_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_root.join(DEFAULT_DB_FILE))
}
