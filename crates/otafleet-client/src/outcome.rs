// ============================================
// File: crates/otafleet-client/src/outcome.rs
// ============================================
//! # Update Outcomes
//!
//! ## Creation Reason
//! Every processed node produces exactly one outcome record. Records are
//! appended to a sink by a single background task so concurrent sessions
//! never interleave writes.
//!
//! ## Main Functionality
//! - `UpdateOutcome`: What a finished session reports to the fleet
//! - `OutcomeSink`: Append-only destination for outcomes
//! - `CsvOutcomeSink`: `update_times.csv` compatible writer
//! - `MemoryOutcomeSink`: In-memory sink for tests and one-off runs
//! - `OutcomeRecorder`: Channel-fed task that owns the sink
//!
//! ## CSV Format
//! ```text
//! NodeID,UpdateDurationSeconds,Version,Result,Attempts
//! a0,12.481,1.1,success,1
//! a1,0.052,1.0,up-to-date,1
//! a2,0.000,,registration-error,1
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The header is only written when the file is empty; rows from earlier
//!   passes are never rewritten
//! - `Result` column values are stable strings, see `FailureReason::as_str`
//!
//! ## Last Modified
//! v0.1.0 - Initial outcome recording

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use otafleet_common::time::unix_timestamp;
use otafleet_common::NodeId;

use crate::error::{ClientError, Result};
use crate::session::{FailureReason, SessionEnd, SessionReport};

/// CSV header line, without the trailing newline.
pub const CSV_HEADER: &str = "NodeID,UpdateDurationSeconds,Version,Result,Attempts";

const RECORDER_CHANNEL_CAPACITY: usize = 1024;

// ============================================
// UpdateOutcome
// ============================================

/// Result column of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeResult {
    /// New firmware installed and submitted.
    Success,
    /// Nothing to update.
    UpToDate,
    /// Session failed.
    Failed(FailureReason),
}

impl OutcomeResult {
    /// Value written to the `Result` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::UpToDate => "up-to-date",
            Self::Failed(reason) => reason.as_str(),
        }
    }

    /// `true` for `Failed`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl std::fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node's record for a fleet pass.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Node the record is for
    pub node_id: NodeId,
    /// Target version, or current version when up to date
    pub version: Option<String>,
    /// VersionQuery start to the terminal state
    pub duration: Duration,
    /// How the session ended
    pub result: OutcomeResult,
    /// Failure detail, empty on success
    pub detail: String,
    /// Sessions run for this node, the recorded one included
    pub attempts: u32,
    /// Unix seconds when the record was made
    pub finished_at: u64,
}

impl UpdateOutcome {
    /// Builds the record for a finished session.
    #[must_use]
    pub fn from_report(report: &SessionReport, attempts: u32) -> Self {
        let (result, detail) = match &report.end {
            SessionEnd::Updated => (OutcomeResult::Success, String::new()),
            SessionEnd::UpToDate => (OutcomeResult::UpToDate, String::new()),
            SessionEnd::Failed(failure) => {
                (OutcomeResult::Failed(failure.reason), failure.detail.clone())
            }
        };
        Self {
            node_id: report.identity.node_id().clone(),
            version: report.version.clone(),
            duration: report.duration,
            result,
            detail,
            attempts,
            finished_at: unix_timestamp(),
        }
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// CSV row, without the trailing newline.
    #[must_use]
    pub fn csv_row(&self) -> String {
        format!(
            "{},{:.3},{},{},{}",
            csv_field(self.node_id.as_str()),
            self.duration_secs(),
            csv_field(self.version.as_deref().unwrap_or("")),
            self.result,
            self.attempts
        )
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ============================================
// Sinks
// ============================================

/// Append-only destination for outcomes.
#[async_trait]
pub trait OutcomeSink: Send {
    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the record could not be written.
    async fn append(&mut self, outcome: &UpdateOutcome) -> Result<()>;

    /// Pushes buffered records to their destination.
    ///
    /// # Errors
    /// Returns an error if buffered records could not be written.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends rows to a CSV file.
#[derive(Debug)]
pub struct CsvOutcomeSink {
    path: PathBuf,
    file: tokio::fs::File,
}

impl CsvOutcomeSink {
    /// Opens `path` for appending, creating it with a header if needed.
    ///
    /// # Errors
    /// Returns `ClientError::Sink` if the file cannot be opened or written.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let context = path.display().to_string();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::sink(parent.display().to_string(), e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ClientError::sink(&context, e))?;

        let len = file
            .metadata()
            .await
            .map_err(|e| ClientError::sink(&context, e))?
            .len();
        if len == 0 {
            file.write_all(format!("{CSV_HEADER}\n").as_bytes())
                .await
                .map_err(|e| ClientError::sink(&context, e))?;
            debug!("Created outcome log {}", context);
        }

        Ok(Self { path, file })
    }

    /// File being appended to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutcomeSink for CsvOutcomeSink {
    async fn append(&mut self, outcome: &UpdateOutcome) -> Result<()> {
        let row = format!("{}\n", outcome.csv_row());
        self.file
            .write_all(row.as_bytes())
            .await
            .map_err(|e| ClientError::sink(self.path.display().to_string(), e))
    }

    async fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| ClientError::sink(self.path.display().to_string(), e))
    }
}

/// Keeps outcomes in memory. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutcomeSink {
    records: Arc<Mutex<Vec<UpdateOutcome>>>,
}

impl MemoryOutcomeSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<UpdateOutcome> {
        self.records.lock().clone()
    }

    /// Number of records so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl OutcomeSink for MemoryOutcomeSink {
    async fn append(&mut self, outcome: &UpdateOutcome) -> Result<()> {
        self.records.lock().push(outcome.clone());
        Ok(())
    }
}

// ============================================
// OutcomeRecorder
// ============================================

enum RecorderMessage {
    Record(Box<UpdateOutcome>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Handle to the background task that owns an `OutcomeSink`.
///
/// Clones share the task. The task ends once every handle is dropped
/// and queued records are written.
#[derive(Clone)]
pub struct OutcomeRecorder {
    tx: mpsc::Sender<RecorderMessage>,
}

impl OutcomeRecorder {
    /// Spawns the recorder task. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Box<dyn OutcomeSink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(RECORDER_CHANNEL_CAPACITY);
        let task = tokio::spawn(Self::run(sink, rx));
        (Self { tx }, task)
    }

    async fn run(mut sink: Box<dyn OutcomeSink>, mut rx: mpsc::Receiver<RecorderMessage>) {
        debug!("Outcome recorder started");
        let mut written = 0u64;

        while let Some(message) = rx.recv().await {
            match message {
                RecorderMessage::Record(outcome) => match sink.append(&outcome).await {
                    Ok(()) => written += 1,
                    Err(e) => warn!("[{}] Outcome not recorded: {}", outcome.node_id, e),
                },
                RecorderMessage::Flush(reply) => {
                    let _ = reply.send(sink.flush().await);
                }
            }
        }

        if let Err(e) = sink.flush().await {
            warn!("Final outcome flush failed: {}", e);
        }
        info!("Outcome recorder stopped ({} records)", written);
    }

    /// Queues `outcome` for the sink.
    ///
    /// # Errors
    /// Returns an error if the recorder task has stopped.
    pub async fn record(&self, outcome: UpdateOutcome) -> Result<()> {
        self.tx
            .send(RecorderMessage::Record(Box::new(outcome)))
            .await
            .map_err(|_| ClientError::internal("outcome recorder stopped"))
    }

    /// Waits until every record queued before this call is written.
    ///
    /// # Errors
    /// Returns the sink's flush error, or an error if the task has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(RecorderMessage::Flush(reply))
            .await
            .map_err(|_| ClientError::internal("outcome recorder stopped"))?;
        done.await
            .map_err(|_| ClientError::internal("outcome recorder dropped flush"))?
    }
}

impl std::fmt::Debug for OutcomeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeRecorder")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionFailure;
    use otafleet_common::NodeIdentity;
    use tempfile::TempDir;

    fn outcome(node: &str, result: OutcomeResult, version: Option<&str>) -> UpdateOutcome {
        UpdateOutcome {
            node_id: NodeId::new(node).unwrap(),
            version: version.map(str::to_string),
            duration: Duration::from_millis(12_481),
            result,
            detail: String::new(),
            attempts: 1,
            finished_at: 0,
        }
    }

    #[test]
    fn test_csv_rows() {
        assert_eq!(
            outcome("a0", OutcomeResult::Success, Some("1.1")).csv_row(),
            "a0,12.481,1.1,success,1"
        );
        let failed = UpdateOutcome {
            duration: Duration::ZERO,
            ..outcome("a2", OutcomeResult::Failed(FailureReason::RegistrationError), None)
        };
        assert_eq!(failed.csv_row(), "a2,0.000,,registration-error,1");
        assert_eq!(
            outcome("a1", OutcomeResult::UpToDate, Some("1.0, beta")).csv_row(),
            "a1,12.481,\"1.0, beta\",up-to-date,1"
        );
    }

    #[test]
    fn test_from_report() {
        let report = SessionReport {
            identity: NodeIdentity::new(NodeId::new("a7").unwrap(), "n100").unwrap(),
            end: SessionEnd::Failed(SessionFailure::new(
                FailureReason::HashMismatchLocal,
                "digest differs",
            )),
            version: Some("1.1".into()),
            duration: Duration::from_secs(3),
            trace: Vec::new(),
        };
        let outcome = UpdateOutcome::from_report(&report, 2);

        assert_eq!(outcome.node_id.as_str(), "a7");
        assert_eq!(
            outcome.result,
            OutcomeResult::Failed(FailureReason::HashMismatchLocal)
        );
        assert!(outcome.result.is_failure());
        assert_eq!(outcome.detail, "digest differs");
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.finished_at > 0);
    }

    #[tokio::test]
    async fn test_csv_sink_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("update_times.csv");

        let mut sink = CsvOutcomeSink::open(&path).await.unwrap();
        sink.append(&outcome("a0", OutcomeResult::Success, Some("1.1")))
            .await
            .unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let mut sink = CsvOutcomeSink::open(&path).await.unwrap();
        sink.append(&outcome("a1", OutcomeResult::UpToDate, Some("1.0")))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "NodeID,UpdateDurationSeconds,Version,Result,Attempts\n\
             a0,12.481,1.1,success,1\n\
             a1,12.481,1.0,up-to-date,1\n"
        );
    }

    #[tokio::test]
    async fn test_recorder_serializes_concurrent_records() {
        let sink = MemoryOutcomeSink::new();
        let (recorder, task) = OutcomeRecorder::spawn(Box::new(sink.clone()));

        let mut handles = Vec::new();
        for i in 0..50 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                recorder
                    .record(outcome(&format!("a{i}"), OutcomeResult::Success, Some("1.1")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        recorder.flush().await.unwrap();
        assert_eq!(sink.len(), 50);

        drop(recorder);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_record_after_stop_fails() {
        let (recorder, task) = OutcomeRecorder::spawn(Box::new(MemoryOutcomeSink::new()));
        task.abort();
        let _ = task.await;

        let err = recorder
            .record(outcome("a0", OutcomeResult::Success, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Internal { .. }));
    }
}
