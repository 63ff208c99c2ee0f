//! fsync helpers for the mirror file.
//!
//! Renaming a file into place only survives power loss once both the file
//! and its parent directory have been synced.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created or renamed in it are durable.
///
/// Only call this with directory paths.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn fsync_file_after_write() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join("site.env")).unwrap();
        file.write_all(b"lrelease=\"6.0.5217\"\n").unwrap();

        fsync_file(&file).unwrap();
    }

    #[test]
    fn fsync_dir_after_create() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("site.env")).unwrap();

        fsync_dir(dir.path()).unwrap();
    }

    #[test]
    fn fsync_dir_missing_path_errors() {
        let dir = tempdir().unwrap();
        assert!(fsync_dir(&dir.path().join("gone")).is_err());
    }
}
