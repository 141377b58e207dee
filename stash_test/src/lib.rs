use std::{
    fs,
    path::{Path, PathBuf},
};

use simple_logger::SimpleLogger;
use stash_shared::log::LevelFilter;

/// Installs a logger that writes everything down to `Trace` to stdout.
///
/// Can be called from every test. Only the first call installs the logger.
pub fn setup_logger() {
    // The logger can only be set once per process and the tests of a crate share one.
    let _ = SimpleLogger::new().with_level(LevelFilter::Trace).init();
}

/// Writes `content` to the file at `relative_path` below `root` and creates the missing parent directories.
///
/// Returns the absolute path of the written file.
pub fn write_file(root: &Path, relative_path: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|err| panic!("Failed to create directory '{}': {err}", parent.display()));
    }
    fs::write(&path, content).unwrap_or_else(|err| panic!("Failed to write file '{}': {err}", path.display()));
    path
}

/// Creates a tree of files below `root`. Each entry is a relative path and the content of the file.
pub fn create_asset_tree(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(relative_path, content)| write_file(root, relative_path, content))
        .collect()
}
