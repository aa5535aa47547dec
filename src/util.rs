use std::path::PathBuf;

pub const DB_FILE: &str = "worlds.db";

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// `worlds.db` at the repo root unless a path was configured.
pub fn default_db_path() -> PathBuf {
    repo_root().join(DB_FILE)
}
