//! Where persisted state lives on disk.

use std::path::{Path, PathBuf};

/// The workspace root, derived from this crate's manifest directory.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Default data directory (`<root>/data`) when none is configured.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// The key-value `DuckDB` file inside a data directory.
#[must_use]
pub fn kv_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("kv.duckdb")
}

/// Creates `path` and any missing parents.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_data_dir_sits_in_the_workspace() {
        let data = data_dir();
        assert!(data.starts_with(project_root()));
        assert!(data.ends_with("data"));
        assert_eq!(kv_db_path(&data), data.join("kv.duckdb"));
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
