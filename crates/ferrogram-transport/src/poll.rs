//! Long-poll transport.
//!
//! [`PollTransport`] runs one control loop task per `start()`:
//!
//! ```text
//! Idle --start()--> Polling --stop() / fatal error--> Idle
//! ```
//!
//! Each iteration issues a single `getUpdates` request carrying the cursor,
//! dispatches the batch in ascending `update_id` order and only then advances
//! the cursor to `max(update_id) + 1`. Between iterations the loop sleeps for
//! the configured interval.
//!
//! # Error handling
//!
//! | Class | Reaction |
//! |-------|----------|
//! | `NotFound`, `Transient` | Logged, cursor unchanged, next iteration as scheduled |
//! | `Conflict` | Webhook removed, iteration retried (bounded, with backoff) |
//! | `Fatal` | Loop stops; the error is kept in [`PollTransport::last_error`] |
//!
//! # Cancellation
//!
//! [`PollTransport::stop`] cancels the sleep between iterations. An iteration
//! already in flight runs to completion (its batch is still dispatched) and
//! the loop exits before scheduling another one. A `start()` right after a
//! `stop()` waits for that iteration.
//!
//! Iterations are serialized per transport: [`PollTransport::poll_once`]
//! called while the loop is running waits for the current iteration, so
//! there is never more than one `getUpdates` request in flight.
//!
//! The loop task keeps the transport alive. Dropping the last outside
//! reference does not stop it; call [`PollTransport::stop`] or
//! [`PollTransport::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ErrorClass, PollError, PollResult};
use crate::source::{UpdateSource, UpdatesRequest};
use ferrogram_core::{BoxedSink, Envelope};

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause between iterations, in milliseconds.
    pub interval_ms: u64,
    /// Long-poll wait passed to the server, in seconds.
    pub timeout_secs: u64,
    /// Maximum updates per batch.
    pub limit: u32,
    /// Cursor to start from instead of the server's oldest pending update.
    pub initial_offset: Option<i64>,
    /// Update kinds to receive. `None` keeps the server's setting.
    pub allowed_updates: Option<Vec<String>>,
    /// Webhook removals attempted per iteration before giving up.
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries, in milliseconds.
    pub conflict_backoff_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            timeout_secs: 30,
            limit: 100,
            initial_offset: None,
            allowed_updates: None,
            max_conflict_retries: 3,
            conflict_backoff_ms: 500,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn conflict_backoff(&self) -> Duration {
        Duration::from_millis(self.conflict_backoff_ms)
    }
}

/// Whether the poll loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Running {
    fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

/// Self-rescheduling long-poll client.
pub struct PollTransport {
    source: Arc<dyn UpdateSource>,
    sink: BoxedSink,
    config: PollConfig,
    cursor: Mutex<Option<i64>>,
    running: Mutex<Option<Running>>,
    last_error: Mutex<Option<PollError>>,
    /// Held for the whole of one iteration.
    iteration: tokio::sync::Mutex<()>,
}

impl PollTransport {
    pub fn new(source: Arc<dyn UpdateSource>, sink: BoxedSink, config: PollConfig) -> Self {
        Self {
            source,
            sink,
            cursor: Mutex::new(config.initial_offset),
            config,
            running: Mutex::new(None),
            last_error: Mutex::new(None),
            iteration: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// The offset the next request will carry.
    pub fn cursor(&self) -> Option<i64> {
        *self.cursor.lock()
    }

    pub fn state(&self) -> PollState {
        match self.running.lock().as_ref() {
            Some(running) if running.is_active() => PollState::Polling,
            _ => PollState::Idle,
        }
    }

    /// The error that stopped the loop most recently, if any.
    pub fn last_error(&self) -> Option<PollError> {
        self.last_error.lock().clone()
    }

    /// Starts the poll loop.
    ///
    /// Returns `false` without doing anything if the loop is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(Running::is_active) {
            return false;
        }

        let previous = running.take().map(|old| old.task);
        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run(token.clone(), previous));
        *running = Some(Running { token, task });
        *self.last_error.lock() = None;
        true
    }

    /// Stops scheduling new iterations. An iteration in flight completes.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().as_ref() {
            running.token.cancel();
        }
    }

    /// Stops the loop and waits until its last iteration has finished.
    pub async fn shutdown(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.token.cancel();
            if let Err(err) = running.task.await {
                error!(error = %err, "Poll task ended abnormally");
            }
        }
    }

    async fn run(self: Arc<Self>, token: CancellationToken, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            if let Err(err) = previous.await {
                error!(error = %err, "Previous poll task ended abnormally");
            }
        }
        info!(interval_ms = self.config.interval_ms, cursor = ?self.cursor(), "Polling started");

        while !token.is_cancelled() {
            if let Err(err) = self.poll_once().await {
                error!(error = %err, "Polling stopped");
                *self.last_error.lock() = Some(err);
                token.cancel();
                return;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        info!(cursor = ?self.cursor(), "Polling stopped");
    }

    /// Runs one iteration: fetch, dispatch, advance the cursor.
    ///
    /// Returns the number of updates received. Swallowed errors count as an
    /// empty batch. Waits for an iteration already in flight, including one
    /// run by the loop.
    pub async fn poll_once(&self) -> PollResult<usize> {
        let _iteration = self.iteration.lock().await;
        let mut conflicts = 0;

        loop {
            let request = self.request();
            let err = match self.source.get_updates(&request).await {
                Ok(batch) => return Ok(self.process_batch(batch).await),
                Err(err) => err,
            };

            match err.class() {
                ErrorClass::NotFound => {
                    debug!(error = %err, "Update endpoint not found");
                    return Ok(0);
                }
                ErrorClass::Transient => {
                    warn!(error = %err, "Transient polling error");
                    return Ok(0);
                }
                ErrorClass::Fatal => return Err(err.into()),
                ErrorClass::Conflict => {
                    if conflicts >= self.config.max_conflict_retries {
                        return Err(PollError::ConflictRetriesExhausted {
                            attempts: conflicts,
                        });
                    }
                    conflicts += 1;
                    warn!(attempt = conflicts, "Webhook conflicts with polling, removing it");

                    if let Err(err) = self.source.delete_webhook(false).await {
                        if err.class() == ErrorClass::Fatal {
                            return Err(err.into());
                        }
                        warn!(error = %err, "Failed to remove webhook");
                    }
                    if conflicts > 1 {
                        tokio::time::sleep(self.config.conflict_backoff() * (conflicts - 1)).await;
                    }
                }
            }
        }
    }

    fn request(&self) -> UpdatesRequest {
        UpdatesRequest {
            offset: self.cursor(),
            limit: Some(self.config.limit),
            timeout: self.config.timeout_secs,
            allowed_updates: self.config.allowed_updates.clone(),
        }
    }

    async fn process_batch(&self, batch: Vec<Value>) -> usize {
        let count = batch.len();
        if count == 0 {
            trace!("Empty update batch");
            return 0;
        }

        let mut updates: Vec<(Option<i64>, Value)> = batch
            .into_iter()
            .map(|value| (value.get("update_id").and_then(Value::as_i64), value))
            .collect();
        updates.sort_by_key(|(update_id, _)| *update_id);
        let max_id = updates.iter().filter_map(|(update_id, _)| *update_id).max();

        for (update_id, value) in updates {
            match Envelope::from_value(value) {
                Ok(envelope) => self.sink.process(envelope).await,
                Err(err) => warn!(?update_id, error = %err, "Skipping malformed update"),
            }
        }

        if let Some(max_id) = max_id {
            let mut cursor = self.cursor.lock();
            let next = max_id + 1;
            if cursor.is_none_or(|current| next > current) {
                *cursor = Some(next);
            }
        }
        debug!(count, cursor = ?self.cursor(), "Processed update batch");
        count
    }
}
