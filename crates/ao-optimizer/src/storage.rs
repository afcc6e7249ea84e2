//! JSON-file study storage.
//!
//! One file holds any number of studies keyed by name. Records are rewritten
//! atomically (temp file in the same directory, then rename) after every
//! trial so an interrupted run can be resumed.

use ao_types::{config_error, AoResult, Direction, StudyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::trial::FrozenTrial;

/// Persisted state of one study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_name: String,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
    pub trials: Vec<FrozenTrial>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    studies: BTreeMap<String, StudyRecord>,
}

/// Resolve a `--storage` URL to a file path.
///
/// Accepts `file://<path>`, `file:<path>` and bare paths.
pub fn parse_storage_url(url: &str) -> AoResult<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return Err(config_error!("storage URL is empty"));
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = url.strip_prefix("file:") {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(StudyError::UnsupportedStorage {
            scheme: scheme.to_string(),
        }
        .into());
    }
    Ok(PathBuf::from(url))
}

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn open(url: &str) -> AoResult<Self> {
        let path = parse_storage_url(url)?;
        if path.as_os_str().is_empty() {
            return Err(config_error!("storage URL {url:?} has no path"));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> AoResult<StorageFile> {
        if !self.path.exists() {
            return Ok(StorageFile::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(StorageFile::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub fn load(&self, study_name: &str) -> AoResult<Option<StudyRecord>> {
        Ok(self.read()?.studies.remove(study_name))
    }

    pub fn save(&self, record: &StudyRecord) -> AoResult<()> {
        let mut file = self.read()?;
        file.studies
            .insert(record.study_name.clone(), record.clone());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            "Saved study {} ({} trials) to {}",
            record.study_name,
            record.trials.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str) -> StudyRecord {
        let mut trial = FrozenTrial::running(0);
        trial.complete(0.5);
        StudyRecord {
            study_name: name.to_string(),
            direction: Direction::Maximize,
            created_at: Utc::now(),
            trials: vec![trial],
        }
    }

    #[test]
    fn storage_url_forms() {
        assert_eq!(
            parse_storage_url("file:///tmp/study.json").unwrap(),
            PathBuf::from("/tmp/study.json")
        );
        assert_eq!(
            parse_storage_url("file:runs/study.json").unwrap(),
            PathBuf::from("runs/study.json")
        );
        assert_eq!(
            parse_storage_url("study.json").unwrap(),
            PathBuf::from("study.json")
        );
    }

    #[test]
    fn unsupported_scheme_is_named() {
        let err = parse_storage_url("sqlite:///example.db").unwrap_err();
        assert!(err.to_string().contains("sqlite"), "{err}");
        assert!(parse_storage_url("  ").is_err());
    }

    #[test]
    fn save_then_load_keeps_other_studies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("studies.json");
        let storage = JsonFileStorage::open(path.to_str().unwrap()).unwrap();

        assert!(storage.load("a").unwrap().is_none());
        storage.save(&record("a")).unwrap();
        storage.save(&record("b")).unwrap();

        let loaded = storage.load("a").unwrap().unwrap();
        assert_eq!(loaded.trials.len(), 1);
        assert_eq!(loaded.direction, Direction::Maximize);
        assert_eq!(storage.load("b").unwrap().unwrap().study_name, "b");
    }
}
