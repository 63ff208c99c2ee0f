//! Local file mirror of the configuration cells.
//!
//! The mirror is a cold-start fallback for when the keyed store was flushed.
//! It is never an authority while the store holds a value.
//!
//! # File Format
//!
//! ```text
//! # comment lines are ignored
//! lrelease="6.0.5217"
//! release_ids=[140381222]
//! ```
//!
//! One `key=<json>` pair per line. A line whose value is not valid JSON is
//! treated as absent.
//!
//! # Atomic Writes
//!
//! Every change rewrites the whole file: write `<path>.tmp`, fsync it, rename
//! over `<path>`, fsync the directory.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::fsync::{fsync_dir, fsync_file};

const HEADER: &str = "# release-watcher cell mirror: one key=<json> per line\n";

/// Errors that can occur while reading or writing the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Handle to the mirror file.
#[derive(Debug)]
pub struct FileMirror {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileMirror {
    /// Opens the mirror at `path`, creating an empty file if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(FileMirror {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every entry. A missing file reads as empty.
    pub fn load(&self) -> Result<BTreeMap<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(parse_mirror(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads one entry.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(name))
    }

    /// Stores `value` under `name`, rewriting the file only if it changes.
    ///
    /// Returns whether the file was rewritten.
    pub fn put(&self, name: &str, value: &Value) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.load()?;
        if entries.get(name) == Some(value) {
            return Ok(false);
        }
        entries.insert(name.to_string(), value.clone());
        write_atomic(&self.path, &render_mirror(&entries)?)?;
        debug!(path = %self.path.display(), name, "mirror rewritten");
        Ok(true)
    }
}

/// Parses mirror text, skipping comments, blank lines and malformed values.
fn parse_mirror(text: &str) -> BTreeMap<String, Value> {
    let mut entries = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, raw)) = line.split_once('=') else {
            warn!(line = lineno + 1, "mirror line without '=' ignored");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => {
                entries.insert(key.to_string(), value);
            }
            Err(e) => {
                warn!(line = lineno + 1, key, error = %e, "malformed mirror value treated as absent");
            }
        }
    }
    entries
}

fn render_mirror(entries: &BTreeMap<String, Value>) -> Result<String> {
    let mut out = String::from(HEADER);
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(&serde_json::to_string(value)?);
        out.push('\n');
    }
    Ok(out)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fsync_dir(parent)?,
        None => fsync_dir(Path::new("."))?,
    }
    Ok(())
}
