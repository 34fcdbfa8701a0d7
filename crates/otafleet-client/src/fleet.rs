// ============================================
// File: crates/otafleet-client/src/fleet.rs
// ============================================
//! # Fleet Driver
//!
//! ## Creation Reason
//! Walks a node range and runs one update session per node. A node that
//! fails never stops the pass; it just becomes a failed outcome.
//!
//! ## Main Functionality
//! - `FleetDriver`: Bounded-concurrency fleet pass plus single-node runs
//! - `FleetOptions`: Concurrency, retry and identity settings
//! - `FleetReport`: Per-node outcomes and pass totals
//!
//! ## Fleet Architecture
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       FleetDriver                          │
//! ├────────────────────────────────────────────────────────────┤
//! │  NodeRange ──► Semaphore(max_concurrent_sessions)          │
//! │                     │                                      │
//! │        ┌────────────┼────────────┐                         │
//! │        ▼            ▼            ▼        JoinSet          │
//! │   run_node(a0) run_node(a1) run_node(a2) ...               │
//! │        │  in-flight guard (DashMap<NodeId, Instant>)       │
//! │        │  retry up to max_session_attempts                 │
//! │        ▼                                                   │
//! │   OutcomeRecorder ──mpsc──► OutcomeSink (CSV)              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `max_concurrent_sessions = 1` is the strictly sequential model
//! - Only the last attempt of a node is recorded; `attempts` says how
//!   many ran
//! - The in-flight guard is released on drop, including when a session
//!   task panics
//!
//! ## Last Modified
//! v0.1.0 - Initial fleet driver

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use otafleet_common::{NodeId, NodeIdentity, NodeRange};
use otafleet_transport::{HttpFirmwareSource, HttpsControlPlane};

use crate::config::ClientConfig;
use crate::control::ControlClient;
use crate::error::{ClientError, Result};
use crate::installer::SimulatedFlasher;
use crate::outcome::{CsvOutcomeSink, OutcomeRecorder, OutcomeResult, UpdateOutcome};
use crate::session::{SessionEnd, SessionServices, SessionSettings, UpdateSession};

// ============================================
// FleetOptions
// ============================================

/// How the driver schedules sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetOptions {
    /// Device type every node presents
    pub device_type: String,
    /// Sessions allowed to run at once
    pub max_concurrent_sessions: usize,
    /// Sessions run per node before its failure is final
    pub max_session_attempts: u32,
    /// Wait between attempts
    pub retry_delay: Duration,
}

impl FleetOptions {
    /// Options from the `[fleet]` section.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            device_type: config.fleet.device_type.clone(),
            max_concurrent_sessions: config.fleet.max_concurrent_sessions,
            max_session_attempts: config.fleet.max_session_attempts,
            retry_delay: config.fleet.retry_delay(),
        }
    }
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

// ============================================
// FleetReport
// ============================================

/// Result of one fleet pass.
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    /// Outcomes in node-index order
    pub outcomes: Vec<UpdateOutcome>,
    /// Nodes that produced no outcome (invalid id, already in flight, panic)
    pub skipped: usize,
    /// Wall time of the whole pass
    pub wall_time: Duration,
}

impl FleetReport {
    /// Nodes updated to a new version.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|r| matches!(r, OutcomeResult::Success))
    }

    /// Nodes that needed no update.
    #[must_use]
    pub fn up_to_date(&self) -> usize {
        self.count(|r| matches!(r, OutcomeResult::UpToDate))
    }

    /// Nodes whose session failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(OutcomeResult::is_failure)
    }

    /// Outcome for `node_id`, if it was processed.
    #[must_use]
    pub fn outcome(&self, node_id: &str) -> Option<&UpdateOutcome> {
        self.outcomes.iter().find(|o| o.node_id.as_str() == node_id)
    }

    fn count(&self, pred: impl Fn(&OutcomeResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}

impl std::fmt::Display for FleetReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes in {:.1}s: {} updated, {} up to date, {} failed",
            self.outcomes.len() + self.skipped,
            self.wall_time.as_secs_f64(),
            self.succeeded(),
            self.up_to_date(),
            self.failed()
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

// ============================================
// FleetDriver
// ============================================

struct FleetInner {
    services: SessionServices,
    settings: SessionSettings,
    options: FleetOptions,
    recorder: OutcomeRecorder,
    in_flight: DashMap<NodeId, Instant>,
}

/// Runs update sessions across a fleet. Cheap to clone.
#[derive(Clone)]
pub struct FleetDriver {
    inner: Arc<FleetInner>,
}

/// Removes a node from the in-flight map when dropped.
struct InFlightGuard {
    inner: Arc<FleetInner>,
    node_id: NodeId,
}

impl InFlightGuard {
    fn acquire(inner: &Arc<FleetInner>, node_id: &NodeId) -> Result<Self> {
        match inner.in_flight.entry(node_id.clone()) {
            Entry::Occupied(_) => {
                return Err(ClientError::SessionInProgress {
                    node_id: node_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }
        Ok(Self {
            inner: Arc::clone(inner),
            node_id: node_id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((_, started)) = self.inner.in_flight.remove(&self.node_id) {
            debug!(
                "[{}] Released after {:.3}s",
                self.node_id,
                started.elapsed().as_secs_f64()
            );
        }
    }
}

impl FleetDriver {
    /// Creates a driver over explicit services.
    #[must_use]
    pub fn new(
        services: SessionServices,
        settings: SessionSettings,
        options: FleetOptions,
        recorder: OutcomeRecorder,
    ) -> Self {
        Self {
            inner: Arc::new(FleetInner {
                services,
                settings,
                options,
                recorder,
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Wires HTTPS transport, the simulated flasher and the CSV outcome log
    /// from `config`.
    ///
    /// Returns the driver and the recorder task; await the task after
    /// dropping every driver clone to be sure the log is closed.
    ///
    /// # Errors
    /// Returns an error if the HTTP clients cannot be built or the outcome
    /// log cannot be opened.
    pub async fn from_config(config: &ClientConfig) -> Result<(Self, JoinHandle<()>)> {
        let transport = config.transport();
        info!("Control server: {}", transport.base_url());

        let plane = HttpsControlPlane::new(&transport)?;
        let firmware = HttpFirmwareSource::new(&transport)?;
        let flasher = SimulatedFlasher::new(
            config.storage.install_dir.clone(),
            config.install.simulated_duration(),
        );

        let services = SessionServices {
            control: ControlClient::new(Arc::new(plane)),
            firmware: Arc::new(firmware),
            flasher: Arc::new(flasher),
        };
        let settings = SessionSettings {
            firmware_dir: config.storage.firmware_dir.clone(),
            post_verify: config.install.post_verify,
            keep_firmware: config.storage.keep_firmware,
        };

        let sink = CsvOutcomeSink::open(&config.storage.outcome_csv).await?;
        info!("Recording outcomes to {}", sink.path().display());
        let (recorder, task) = OutcomeRecorder::spawn(Box::new(sink));

        Ok((
            Self::new(services, settings, FleetOptions::from_config(config), recorder),
            task,
        ))
    }

    /// Scheduling options.
    #[must_use]
    pub fn options(&self) -> &FleetOptions {
        &self.inner.options
    }

    /// Nodes with a session running right now.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Runs one pass over `range`.
    ///
    /// Every node gets a session; failures are reported, never returned.
    pub async fn run(&self, range: &NodeRange) -> FleetReport {
        let started = Instant::now();
        let limit = self.inner.options.max_concurrent_sessions.max(1);
        info!(
            "Fleet pass over {} ({} nodes, {} at a time)",
            range,
            range.len(),
            limit
        );

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (index, node_id) in range.iter() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let driver = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = driver.run_node(node_id.clone()).await;
                (index, node_id, result)
            });
        }

        let mut report = FleetReport::default();
        let mut indexed = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(outcome))) => indexed.push((index, outcome)),
                Ok((_, node_id, Err(e))) => {
                    warn!("[{}] Skipped: {}", node_id, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Session task aborted: {}", e);
                    report.skipped += 1;
                }
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        report.outcomes = indexed.into_iter().map(|(_, outcome)| outcome).collect();

        if let Err(e) = self.inner.recorder.flush().await {
            warn!("Outcome log flush failed: {}", e);
        }

        report.wall_time = started.elapsed();
        info!("Fleet pass complete: {}", report);
        report
    }

    /// Runs a session for one node, retrying failures up to
    /// `max_session_attempts`, and records the final outcome.
    ///
    /// # Errors
    /// - `SessionInProgress` if a session for `node_id` is already running
    /// - Identity errors if the configured device type is invalid
    pub async fn run_node(&self, node_id: NodeId) -> Result<UpdateOutcome> {
        let identity = NodeIdentity::new(node_id.clone(), &self.inner.options.device_type)?;
        let _guard = InFlightGuard::acquire(&self.inner, &node_id)?;

        let max_attempts = self.inner.options.max_session_attempts.max(1);
        let mut attempts = 0;

        let report = loop {
            attempts += 1;
            let report = UpdateSession::new(
                identity.clone(),
                self.inner.services.clone(),
                self.inner.settings.clone(),
            )
            .run()
            .await;

            match &report.end {
                SessionEnd::Failed(failure) if attempts < max_attempts => {
                    warn!(
                        "[{}] Attempt {}/{} failed ({}), retrying in {:?}",
                        node_id, attempts, max_attempts, failure.reason, self.inner.options.retry_delay
                    );
                    tokio::time::sleep(self.inner.options.retry_delay).await;
                }
                _ => break report,
            }
        };

        let outcome = UpdateOutcome::from_report(&report, attempts);
        info!(
            "[{}] Outcome: {} version={} duration={:.3}s attempts={}",
            outcome.node_id,
            outcome.result,
            outcome.version.as_deref().unwrap_or("-"),
            outcome.duration_secs(),
            outcome.attempts
        );

        if let Err(e) = self.inner.recorder.record(outcome.clone()).await {
            warn!("[{}] Outcome not recorded: {}", node_id, e);
        }
        Ok(outcome)
    }

    /// Waits until every outcome recorded so far is written.
    ///
    /// # Errors
    /// Returns the sink's error if writing failed.
    pub async fn flush(&self) -> Result<()> {
        self.inner.recorder.flush().await
    }
}

impl std::fmt::Debug for FleetDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetDriver")
            .field("options", &self.inner.options)
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}
