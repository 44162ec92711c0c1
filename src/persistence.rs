//! Autosave artifacts for an in-progress procedure.
//!
//! Progress is split across two files in the state directory:
//! - a bincode blob with the step list, image payloads included
//! - a pretty-printed JSON file with the metadata, readable by humans
//!
//! Both are written on every save, steps first. There is no transactional
//! guarantee: a crash between the two writes leaves them out of step.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::types::{now_timestamp, Metadata, Step};

/// Errors reading or writing the autosave artifacts
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to encode steps: {0}")]
    EncodeSteps(#[source] bincode::Error),

    #[error("step data in {} is unreadable: {source}", path.display())]
    DecodeSteps {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("failed to encode metadata: {0}")]
    EncodeMetadata(#[source] serde_json::Error),

    #[error("metadata in {} is unreadable: {source}", path.display())]
    DecodeMetadata {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| PersistError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of reading both artifacts at startup.
///
/// Steps are read first. If that fails nothing else is attempted; if the
/// metadata read fails the steps that were read are still returned.
#[derive(Debug, Default)]
pub struct Restored {
    /// `None` when no step artifact exists (or it could not be read)
    pub steps: Option<Vec<Step>>,
    /// `None` when no metadata artifact exists (or it could not be read)
    pub metadata: Option<Metadata>,
    /// First failure encountered, if any
    pub error: Option<PersistError>,
}

/// Reads and writes the autosave artifact pair
#[derive(Debug, Clone)]
pub struct AutosaveStore {
    state_dir: PathBuf,
    steps_path: PathBuf,
    metadata_path: PathBuf,
}

impl AutosaveStore {
    pub fn new(config: &Config) -> Self {
        Self {
            state_dir: config.state_path(),
            steps_path: config.steps_file_path(),
            metadata_path: config.metadata_file_path(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn steps_path(&self) -> &Path {
        &self.steps_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Write steps, then metadata with a fresh `last_saved` stamp.
    ///
    /// Returns the stamp that was written.
    pub fn save(&self, steps: &[Step], metadata: &Metadata) -> Result<NaiveDateTime, PersistError> {
        fs::create_dir_all(&self.state_dir)
            .map_err(PersistError::io("create", &self.state_dir))?;

        let encoded = bincode::serialize(steps).map_err(PersistError::EncodeSteps)?;
        fs::write(&self.steps_path, &encoded)
            .map_err(PersistError::io("write", &self.steps_path))?;

        let saved_at = now_timestamp();
        let record = Metadata {
            last_saved: Some(saved_at),
            ..metadata.clone()
        };
        let json = serde_json::to_string_pretty(&record).map_err(PersistError::EncodeMetadata)?;
        fs::write(&self.metadata_path, json)
            .map_err(PersistError::io("write", &self.metadata_path))?;

        debug!(
            steps = steps.len(),
            bytes = encoded.len(),
            saved_at = %saved_at,
            "Saved progress"
        );
        Ok(saved_at)
    }

    /// Read the step artifact, if present
    pub fn load_steps(&self) -> Result<Option<Vec<Step>>, PersistError> {
        if !self.steps_path.exists() {
            return Ok(None);
        }
        let bytes =
            fs::read(&self.steps_path).map_err(PersistError::io("read", &self.steps_path))?;
        let steps: Vec<Step> =
            bincode::deserialize(&bytes).map_err(|source| PersistError::DecodeSteps {
                path: self.steps_path.clone(),
                source,
            })?;
        Ok(Some(steps))
    }

    /// Read the metadata artifact, if present
    pub fn load_metadata(&self) -> Result<Option<Metadata>, PersistError> {
        if !self.metadata_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.metadata_path)
            .map_err(PersistError::io("read", &self.metadata_path))?;
        let metadata: Metadata =
            serde_json::from_str(&contents).map_err(|source| PersistError::DecodeMetadata {
                path: self.metadata_path.clone(),
                source,
            })?;
        Ok(Some(metadata))
    }

    /// Read both artifacts, never failing
    pub fn load(&self) -> Restored {
        let mut restored = Restored::default();

        match self.load_steps() {
            Ok(steps) => restored.steps = steps,
            Err(err) => {
                warn!(error = %err, "Could not restore steps");
                restored.error = Some(err);
                return restored;
            }
        }

        match self.load_metadata() {
            Ok(metadata) => restored.metadata = metadata,
            Err(err) => {
                warn!(error = %err, "Could not restore metadata");
                restored.error = Some(err);
            }
        }

        if let Some(steps) = &restored.steps {
            info!(steps = steps.len(), "Restored saved progress");
        }
        restored
    }

    /// Delete both artifacts. Missing files are fine, so clearing twice succeeds.
    pub fn clear(&self) -> Result<(), PersistError> {
        let steps = remove_if_exists(&self.steps_path);
        let metadata = remove_if_exists(&self.metadata_path);
        steps?;
        metadata?;
        info!(state_dir = %self.state_dir.display(), "Cleared saved progress");
        Ok(())
    }

    /// The `last_saved` field of the metadata artifact, as written
    pub fn last_saved(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.metadata_path).ok()?;
        let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
        value
            .get("last_saved")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    /// Whether either artifact is on disk
    pub fn has_saved_data(&self) -> bool {
        self.steps_path.exists() || self.metadata_path.exists()
    }
}

fn remove_if_exists(path: &Path) -> Result<(), PersistError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PersistError::Io {
            action: "delete",
            path: path.to_path_buf(),
            source,
        }),
    }
}
