// Per-entity append-only JSON Lines datasets.
//
// One file per entity and side (raw posts, sentiment results). Appends copy
// the existing bytes verbatim into a temp file next to the target, add the new
// rows, fsync, then rename over the target, so readers only ever see the old
// file or the new one.

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use tickerpulse_common::{entity_slug, PostRecord, SentimentRecord};

use crate::error::{Result, StoreError};

/// A row type that can live in a [`RecordStore`].
pub trait StoredRecord: Serialize + DeserializeOwned {
    fn record_id(&self) -> &str;
}

impl StoredRecord for PostRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl StoredRecord for SentimentRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// The loaded contents of one entity's file. A missing file loads as an empty
/// dataset, so callers never branch on file existence.
#[derive(Debug, Clone)]
pub struct Dataset<R> {
    entity: String,
    path: PathBuf,
    records: Vec<R>,
    quarantined: usize,
}

impl<R: StoredRecord> Dataset<R> {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Valid rows in file order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows that were skipped at load because they were malformed.
    pub fn quarantined(&self) -> usize {
        self.quarantined
    }

    pub fn ids(&self) -> HashSet<String> {
        self.records
            .iter()
            .map(|r| r.record_id().to_string())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Durable storage for one side of every entity's dataset.
#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    dir: PathBuf,
    suffix: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> RecordStore<R> {
    /// Files are `<dir>/<entity-slug><suffix>`.
    pub fn new(dir: impl Into<PathBuf>, suffix: &str) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.to_string(),
            _record: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{}{}", entity_slug(entity), self.suffix))
    }

    /// Load every valid row for `entity`. Malformed rows (unparseable, or with a
    /// blank id) are quarantined: skipped, counted and logged.
    pub fn load(&self, entity: &str) -> Result<Dataset<R>> {
        let path = self.path_for(entity);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(entity, path = %path.display(), "No dataset yet, cold start");
                return Ok(Dataset {
                    entity: entity.to_string(),
                    path,
                    records: Vec::new(),
                    quarantined: 0,
                });
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let mut records = Vec::new();
        let mut quarantined = 0;
        for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let parsed = std::str::from_utf8(line)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<R>(s).map_err(|e| e.to_string()));
            match parsed {
                Ok(record) if !record.record_id().trim().is_empty() => records.push(record),
                Ok(_) => {
                    warn!(entity, path = %path.display(), line = idx + 1, "Quarantined row with blank id");
                    quarantined += 1;
                }
                Err(error) => {
                    warn!(entity, path = %path.display(), line = idx + 1, %error, "Quarantined malformed row");
                    quarantined += 1;
                }
            }
        }

        Ok(Dataset {
            entity: entity.to_string(),
            path,
            records,
            quarantined,
        })
    }

    /// Ids already stored for `entity`.
    pub fn existing_ids(&self, entity: &str) -> Result<HashSet<String>> {
        Ok(self.load(entity)?.ids())
    }

    /// Append `records` after the existing rows and atomically replace the file.
    ///
    /// The caller is responsible for filtering out ids that are already stored.
    /// An empty slice is a no-op and leaves the file untouched.
    pub fn append(&self, entity: &str, records: &[R]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let path = self.path_for(entity);
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let existing = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io(path, e)),
        };

        // Dropped (and deleted) on any early return, leaving the target as it was.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let tmp_path = tmp.path().to_path_buf();

        let mut buf = Vec::new();
        if let Some(bytes) = &existing {
            buf.extend_from_slice(bytes);
            if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                buf.push(b'\n');
            }
        }
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(|source| StoreError::Serialize {
                id: record.record_id().to_string(),
                source,
            })?;
            buf.push(b'\n');
        }

        tmp.write_all(&buf)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        set_readable_permissions(&tmp, &path).map_err(|e| StoreError::io(&tmp_path, e))?;

        tmp.persist(&path).map_err(|e| StoreError::io(&path, e.error))?;
        sync_dir(&self.dir);

        info!(
            entity,
            path = %path.display(),
            appended = records.len(),
            "Dataset updated"
        );
        Ok(records.len())
    }
}

/// Temp files are created owner-only; keep the target's mode, or use a
/// world-readable default for new files.
#[cfg(unix)]
fn set_readable_permissions(tmp: &NamedTempFile, target: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let perms = match fs::metadata(target) {
        Ok(meta) => meta.permissions(),
        Err(_) => fs::Permissions::from_mode(0o644),
    };
    tmp.as_file().set_permissions(perms)
}

#[cfg(not(unix))]
fn set_readable_permissions(_tmp: &NamedTempFile, _target: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Make the rename durable. Best effort: a failure here does not undo the append.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "Failed to sync data directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// The raw and enriched sides of every entity's dataset under one data dir.
#[derive(Debug, Clone)]
pub struct Stores {
    pub raw: RecordStore<PostRecord>,
    pub enriched: RecordStore<SentimentRecord>,
}

impl Stores {
    /// `<data_dir>/raw/<slug>_reddit.jsonl` and
    /// `<data_dir>/enriched/<slug>_sentiment_reddit.jsonl`.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            raw: RecordStore::new(data_dir.join("raw"), "_reddit.jsonl"),
            enriched: RecordStore::new(data_dir.join("enriched"), "_sentiment_reddit.jsonl"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tickerpulse_common::SentimentScores;

    fn post(id: &str) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            entity: "Apple".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 3, 14, 0, 0).unwrap(),
            title: format!("title {id}"),
            body: format!("body {id}"),
            subreddit: Some("stocks".to_string()),
            score: Some(1),
            num_comments: None,
            author: None,
            url: None,
        }
    }

    fn ids(dataset: &Dataset<PostRecord>) -> Vec<&str> {
        dataset.records().iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn missing_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        let dataset = stores.raw.load("Apple").unwrap();
        assert_eq!(dataset.entity(), "Apple");
        assert!(dataset.is_empty());
        assert_eq!(dataset.quarantined(), 0);
        assert!(stores.raw.existing_ids("Apple").unwrap().is_empty());
        assert!(!dataset.path().exists());
    }

    #[test]
    fn append_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        stores.raw.append("Apple", &[post("p1"), post("p2")]).unwrap();
        stores.raw.append("Apple", &[post("p3")]).unwrap();

        let dataset = stores.raw.load("Apple").unwrap();
        assert_eq!(ids(&dataset), vec!["p1", "p2", "p3"]);
        assert_eq!(dataset.records()[0], post("p1"));
    }

    #[test]
    fn append_never_rewrites_history() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        stores.raw.append("Apple", &[post("p1")]).unwrap();
        let path = stores.raw.path_for("Apple");
        let before = fs::read(&path).unwrap();

        stores.raw.append("Apple", &[post("p2")]).unwrap();
        let after = fs::read(&path).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(after.iter().filter(|b| **b == b'\n').count(), 2);
    }

    #[test]
    fn empty_append_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        assert_eq!(stores.raw.append("Apple", &[]).unwrap(), 0);
        assert!(!stores.raw.dir().exists());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        stores.raw.append("Apple", &[post("p1")]).unwrap();
        stores.raw.append("Apple", &[post("p2")]).unwrap();

        let names: Vec<String> = fs::read_dir(stores.raw.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["apple_reddit.jsonl".to_string()]);
    }

    #[test]
    fn entities_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());

        stores.raw.append("Apple", &[post("p1")]).unwrap();
        stores.raw.append("Tesla", &[post("t1")]).unwrap();

        assert_eq!(ids(&stores.raw.load("Apple").unwrap()), vec!["p1"]);
        assert_eq!(ids(&stores.raw.load("Tesla").unwrap()), vec!["t1"]);
    }

    #[test]
    fn malformed_rows_are_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());
        stores.raw.append("Apple", &[post("p1")]).unwrap();

        let path = stores.raw.path_for("Apple");
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":\"p2\",\"entity\":\"Apple\"}\n");
        content.push_str("not json at all\n");
        content.push('\n');
        let mut blank = serde_json::to_value(post("x")).unwrap();
        blank["id"] = serde_json::Value::String(" ".to_string());
        content.push_str(&format!("{blank}\n"));
        fs::write(&path, content).unwrap();

        let dataset = stores.raw.load("Apple").unwrap();
        assert_eq!(ids(&dataset), vec!["p1"]);
        assert_eq!(dataset.quarantined(), 3);
    }

    #[test]
    fn append_after_quarantined_rows_keeps_them_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());
        let path = stores.raw.path_for("Apple");
        fs::create_dir_all(stores.raw.dir()).unwrap();
        // No trailing newline, as a hand edit might leave it.
        fs::write(&path, "garbage").unwrap();

        stores.raw.append("Apple", &[post("p1")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("garbage\n{\"id\":\"p1\""));
        let dataset = stores.raw.load("Apple").unwrap();
        assert_eq!(ids(&dataset), vec!["p1"]);
        assert_eq!(dataset.quarantined(), 1);
    }

    #[test]
    fn unwritable_location_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let stores = Stores::open(&blocker);

        let err = stores.raw.append("Apple", &[post("p1")]).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn enriched_side_uses_its_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(dir.path());
        let scored = SentimentRecord::from_post(
            &post("p1"),
            SentimentScores::from_probabilities(0.1, 0.2, 0.7),
            "finbert",
        );

        stores.enriched.append("Apple", &[scored.clone()]).unwrap();

        assert!(stores
            .enriched
            .path_for("Apple")
            .ends_with("enriched/apple_sentiment_reddit.jsonl"));
        assert!(stores.raw.load("Apple").unwrap().is_empty());
        assert_eq!(stores.enriched.load("Apple").unwrap().records(), &[scored]);
    }
}
