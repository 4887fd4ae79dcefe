//! Snapshot store.
//!
//! Every successful migration run writes the schema it produced to
//! `<dir>/Migration_<YYYY-MM-DD-HH-MM-SS>.json`. The file with the latest
//! timestamp is the persisted schema the next run diffs against.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::{Migration, DEFAULT_DIRECTORY};

/// File name prefix of snapshot files.
pub const FILE_PREFIX: &str = "Migration_";
/// File name suffix of snapshot files.
pub const FILE_SUFFIX: &str = ".json";
/// Timestamp format used in snapshot file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Directory of schema snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTORY)
    }
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the snapshot for `timestamp`.
    #[must_use]
    pub fn path_for(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{FILE_PREFIX}{}{FILE_SUFFIX}",
            timestamp.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Lists the snapshot files, oldest first.
    ///
    /// Creates the directory when it does not exist. A file carrying the
    /// snapshot prefix without a parseable timestamp is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the directory cannot be created or read,
    /// and [`Error::SnapshotName`] for a malformed snapshot file name.
    pub fn list(&self) -> Result<Vec<(NaiveDateTime, PathBuf)>> {
        fs::create_dir_all(&self.dir)?;

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name.strip_prefix(FILE_PREFIX) else {
                continue;
            };
            let stamp = stamp.strip_suffix(FILE_SUFFIX).unwrap_or(stamp);
            let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
                .map_err(|_| Error::SnapshotName(name.clone()))?;
            snapshots.push((timestamp, entry.path()));
        }

        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(snapshots)
    }

    /// Returns the path of the latest snapshot, if any.
    ///
    /// # Errors
    ///
    /// Fails like [`SnapshotStore::list`].
    pub fn latest_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.pop().map(|(_, path)| path))
    }

    /// Loads the latest snapshot, or an empty migration when there is none.
    ///
    /// # Errors
    ///
    /// Fails like [`SnapshotStore::list`], or like [`SnapshotStore::read`]
    /// for the latest file.
    pub fn load(&self) -> Result<Migration> {
        match self.latest_path()? {
            Some(path) => {
                debug!(path = %path.display(), "Loading latest migration");
                Self::read(&path)
            }
            None => {
                debug!(dir = %self.dir.display(), "No previous migrations found");
                Ok(Migration::new())
            }
        }
    }

    /// Reads one snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and
    /// [`Error::Serialization`] when it is not a snapshot document.
    pub fn read(path: &Path) -> Result<Migration> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes a snapshot named after the current local time.
    ///
    /// # Errors
    ///
    /// Fails like [`SnapshotStore::save_at`].
    pub fn save(&self, migration: &Migration) -> Result<PathBuf> {
        self.save_at(migration, Local::now().naive_local())
    }

    /// Writes a snapshot named after `timestamp`.
    ///
    /// The document is written to a temporary file in the snapshot directory
    /// and renamed over the target, so a second save within the same second
    /// replaces the first and the newest schema wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the directory or file cannot be written and
    /// [`Error::Serialization`] when the migration cannot be encoded.
    pub fn save_at(&self, migration: &Migration, timestamp: NaiveDateTime) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(timestamp);

        let mut snapshot = migration.clone();
        snapshot.directory = self.dir.display().to_string();
        let json = to_json(&snapshot)?;

        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(&json)?;
        file.persist(&path).map_err(|err| Error::Io(err.error))?;

        info!(path = %path.display(), tables = snapshot.tables.len(), "Wrote migration file");
        Ok(path)
    }
}

/// Pretty JSON with four-space indentation.
fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
