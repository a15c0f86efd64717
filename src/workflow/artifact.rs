//! Append-only artifact sink for workflow run output (spec §4.7
//! "artifacts"): one JSON line per completed step, plus captured
//! values, so a run can be audited after the fact.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outcome of a single step, recorded regardless of success or
/// failure so a run can be reconstructed from its artifacts alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepOutcome {
    Success,
    Failure { message: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub step_index: usize,
    pub step_kind: String,
    pub outcome: StepOutcome,
    pub capture: Option<(String, String)>,
}

/// Where workflow run artifacts are written.
pub trait ArtifactSink: Send + Sync {
    fn record(&self, entry: ArtifactEntry) -> Result<()>;
}

/// Appends each entry as one JSON line to a file, one file per run.
pub struct FileArtifactSink {
    file: Mutex<std::fs::File>,
}

impl FileArtifactSink {
    pub fn create(dir: &Path, run_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::from)?;
        let path = dir.join(format!("{run_id}.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::from)?;
        Ok(FileArtifactSink { file: Mutex::new(file) })
    }

    /// Default artifact directory: the platform data-local directory
    /// under `tn5250-client/artifacts`, falling back to `./artifacts`
    /// when no data-local directory can be determined (spec §6
    /// "Environment").
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("tn5250-client").join("artifacts"))
            .unwrap_or_else(|| PathBuf::from("artifacts"))
    }
}

impl ArtifactSink for FileArtifactSink {
    fn record(&self, entry: ArtifactEntry) -> Result<()> {
        let line = serde_json::to_string(&entry)
            .map_err(|e| Error::Config(crate::error::ConfigError::InvalidWorkflowDefinition {
                reason: format!("serializing artifact entry: {e}"),
            }))?;
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{line}").map_err(Error::from)
    }
}

/// In-process sink for tests and short-lived scripted runs.
#[derive(Default)]
pub struct MemoryArtifactSink {
    entries: Mutex<Vec<ArtifactEntry>>,
}

impl MemoryArtifactSink {
    pub fn new() -> Self {
        MemoryArtifactSink::default()
    }

    pub fn entries(&self) -> Vec<ArtifactEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ArtifactSink for MemoryArtifactSink {
    fn record(&self, entry: ArtifactEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(step_index: usize) -> ArtifactEntry {
        ArtifactEntry {
            run_id: "run-1".into(),
            timestamp: Utc::now(),
            step_index,
            step_kind: "fill".into(),
            outcome: StepOutcome::Success,
            capture: None,
        }
    }

    #[test]
    fn memory_sink_accumulates_entries_in_order() {
        let sink = MemoryArtifactSink::new();
        sink.record(entry(0)).unwrap();
        sink.record(entry(1)).unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].step_index, 1);
    }

    #[test]
    fn file_sink_appends_one_json_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::create(dir.path(), "run-1").unwrap();
        sink.record(entry(0)).unwrap();
        sink.record(entry(1)).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("run-1.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("\"step_index\":0"));
    }
}
