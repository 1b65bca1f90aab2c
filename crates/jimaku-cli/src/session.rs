use crate::config::ConfigPaths;
use jimaku_core::{FinalizedLine, ReconcilerConfig};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io error: {0}")]
    Io(#[from] io::Error),
    #[error("session metadata error: {0}")]
    Metadata(#[from] toml::ser::Error),
    #[error("session line encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session time error: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub finalized: bool,
    pub lines_file: String,
    pub lines_emitted: u64,
    pub reconciler: ReconcilerConfig,
}

impl SessionMetadata {
    pub fn new(reconciler: ReconcilerConfig) -> Result<Self, SessionError> {
        let id = Uuid::now_v7().to_string();
        let start_time = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let lines_file = format!("lines-{id}.jsonl");
        Ok(Self {
            id,
            start_time,
            end_time: None,
            finalized: false,
            lines_file,
            lines_emitted: 0,
            reconciler,
        })
    }
}

/// One run's export: a session directory holding `metadata.toml` and the
/// finalized lines as JSONL, flushed per line so a crash loses at most the
/// line being written.
#[derive(Debug)]
pub struct SessionHandle {
    metadata_path: PathBuf,
    metadata: SessionMetadata,
    lines: File,
}

impl SessionHandle {
    pub fn start(paths: &ConfigPaths, metadata: SessionMetadata) -> Result<Self, SessionError> {
        fs::create_dir_all(&paths.sessions_dir)?;
        let dir = paths.sessions_dir.join(&metadata.id);
        fs::create_dir_all(&dir)?;

        let metadata_path = dir.join("metadata.toml");
        let lines_path = dir.join(&metadata.lines_file);

        write_metadata(&metadata_path, &metadata)?;
        let lines = OpenOptions::new()
            .create(true)
            .append(true)
            .open(lines_path)?;

        Ok(Self {
            metadata_path,
            metadata,
            lines,
        })
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn append(&mut self, line: &FinalizedLine) -> Result<(), SessionError> {
        let encoded = serde_json::to_string(line)?;
        writeln!(self.lines, "{encoded}")?;
        self.lines.flush()?;
        self.metadata.lines_emitted += 1;
        Ok(())
    }

    /// Stamp the end time and mark the session complete.
    pub fn finalize(mut self) -> Result<SessionMetadata, SessionError> {
        self.metadata.end_time = Some(OffsetDateTime::now_utc().format(&Rfc3339)?);
        self.metadata.finalized = true;
        write_metadata(&self.metadata_path, &self.metadata)?;
        Ok(self.metadata)
    }
}

fn write_metadata(path: &Path, metadata: &SessionMetadata) -> Result<(), SessionError> {
    let rendered = toml::to_string_pretty(metadata)?;
    write_atomic(path, rendered.as_bytes())?;
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
