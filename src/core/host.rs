//! Host boundary: calls into the authoring host and their replies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   crossbeam channel    ┌────────────────────────┐
//! │  UI thread           │  ──── HostCall ─────▶  │  host-bridge thread    │
//! │  (Editor)            │                        │  HostBridge::call()    │
//! │  holds GateGuard     │  ◀── HostResponse ───  │  parse reply           │
//! └──────────────────────┘                        └────────────────────────┘
//! ```
//!
//! [`HostClient::submit`] claims the [`HostSyncGate`] and hands one call to
//! the bridge thread. The guard is released only when the UI thread takes the
//! reply in [`HostClient::poll`] / [`HostClient::wait`], so at most one host
//! request is ever in flight.
//!
//! Reply contract (from the host scripts):
//! - query: composition JSON, or `{"error": "..."}`
//! - mutations: literal `success`, anything else is an error message

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;

use super::sync_gate::{GateGuard, HostSyncGate};
use crate::entities::Composition;

/// Host sync errors. All are recoverable and shown as notices.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncError {
    /// No bridge to the host (panel running standalone, bridge thread gone)
    HostUnavailable,
    /// Another host request is still in flight
    HostBusy,
    /// Query returned an `error` field or unparsable JSON
    HostQueryFailed(String),
    /// Mutation returned something other than `success`
    HostMutationRejected(String),
    /// Interchange file is not a composition document
    InvalidImportDocument(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::HostUnavailable => write!(f, "Host is not available"),
            SyncError::HostBusy => write!(f, "Host is busy with another request"),
            SyncError::HostQueryFailed(e) => write!(f, "Host query failed: {}", e),
            SyncError::HostMutationRejected(e) => write!(f, "Host rejected change: {}", e),
            SyncError::InvalidImportDocument(e) => write!(f, "Invalid composition document: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

/// Spacing unit for duplicate-on-beat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    #[default]
    Beat,
    /// One bar = 4 beats
    Bar,
}

impl DuplicateMode {
    pub fn beats(self) -> u32 {
        match self {
            DuplicateMode::Beat => 1,
            DuplicateMode::Bar => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DuplicateMode::Beat => "beat",
            DuplicateMode::Bar => "bar",
        }
    }
}

impl std::str::FromStr for DuplicateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beat" => Ok(DuplicateMode::Beat),
            "bar" => Ok(DuplicateMode::Bar),
            other => Err(format!("unknown duplicate mode '{}' (expected beat|bar)", other)),
        }
    }
}

/// One request to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    QueryComposition,
    MoveLayer { layer_index: u32, new_in_point: f64 },
    ScaleLayer { layer_index: u32, new_in_point: f64, new_out_point: f64 },
    DuplicateLayer { layer_index: u32, bpm: f64, count: u32, mode: DuplicateMode },
}

impl HostCall {
    pub fn name(&self) -> &'static str {
        match self {
            HostCall::QueryComposition => "getCompData",
            HostCall::MoveLayer { .. } => "moveLayer",
            HostCall::ScaleLayer { .. } => "scaleLayer",
            HostCall::DuplicateLayer { .. } => "duplicateLayer",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostCall::QueryComposition)
    }

    /// Script text for eval-based transports.
    pub fn to_script(&self) -> String {
        match self {
            HostCall::QueryComposition => format!("{}()", self.name()),
            HostCall::MoveLayer { layer_index, new_in_point } => {
                format!("{}({}, {})", self.name(), layer_index, new_in_point)
            }
            HostCall::ScaleLayer { layer_index, new_in_point, new_out_point } => {
                format!("{}({}, {}, {})", self.name(), layer_index, new_in_point, new_out_point)
            }
            HostCall::DuplicateLayer { layer_index, bpm, count, mode } => {
                format!("{}({}, {}, {}, \"{}\")", self.name(), layer_index, bpm, count, mode.as_str())
            }
        }
    }
}

/// Transport to the authoring host. Returns the raw reply string.
///
/// Implementations are called from the bridge thread only, one call at a time.
pub trait HostBridge: Send + Sync {
    fn call(&self, call: &HostCall) -> Result<String, SyncError>;
}

/// Parsed reply payload
#[derive(Clone, Debug, PartialEq)]
pub enum HostReply {
    Composition(Composition),
    Done,
}

/// Reply for one submitted call.
#[derive(Clone, Debug)]
pub struct HostResponse {
    pub call: HostCall,
    pub result: Result<HostReply, SyncError>,
}

/// Parse a query reply. `{"error": ..}` and malformed JSON both fail.
pub fn parse_query_reply(raw: &str) -> Result<Composition, SyncError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| SyncError::HostQueryFailed(format!("malformed reply: {}", e)))?;

    if let Some(err) = value.get("error") {
        let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(SyncError::HostQueryFailed(msg));
    }

    serde_json::from_value(value).map_err(|e| SyncError::HostQueryFailed(format!("unexpected reply: {}", e)))
}

/// Parse a mutation reply. Only the literal `success` is accepted.
pub fn parse_mutation_reply(raw: &str) -> Result<(), SyncError> {
    let trimmed = raw.trim();
    if trimmed == "success" {
        return Ok(());
    }
    // Host scripts wrap exceptions as {"error": msg}
    let msg = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| trimmed.to_string());
    Err(SyncError::HostMutationRejected(msg))
}

fn run_call(bridge: &dyn HostBridge, call: &HostCall) -> Result<HostReply, SyncError> {
    let raw = bridge.call(call)?;
    trace!("host {} -> {} bytes", call.name(), raw.len());
    match call {
        HostCall::QueryComposition => parse_query_reply(&raw).map(HostReply::Composition),
        _ => parse_mutation_reply(&raw).map(|_| HostReply::Done),
    }
}

/// Serialized client for the host bridge.
///
/// Owns the bridge thread and the gate guard of the outstanding request.
pub struct HostClient {
    gate: HostSyncGate,
    jobs: Option<Sender<HostCall>>,
    replies: Receiver<HostResponse>,
    pending: Option<(HostCall, GateGuard)>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HostClient {
    /// Spawn the bridge thread.
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<HostCall>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<HostResponse>();

        let handle = thread::Builder::new()
            .name("soundsync-host-bridge".to_string())
            .spawn(move || {
                trace!("Host bridge thread started");
                for call in job_rx.iter() {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        run_call(bridge.as_ref(), &call)
                    }));
                    let result = outcome.unwrap_or_else(|_| {
                        error!("Host bridge panicked during {}", call.name());
                        Err(SyncError::HostUnavailable)
                    });
                    if reply_tx.send(HostResponse { call, result }).is_err() {
                        break;
                    }
                }
                trace!("Host bridge thread stopped");
            });

        match handle {
            Ok(handle) => Self {
                gate: HostSyncGate::new(),
                jobs: Some(job_tx),
                replies: reply_rx,
                pending: None,
                handle: Some(handle),
            },
            Err(e) => {
                error!("Failed to spawn host bridge thread: {}", e);
                Self::disconnected()
            }
        }
    }

    /// Client with no host behind it; every submit fails with `HostUnavailable`.
    pub fn disconnected() -> Self {
        let (_tx, replies) = crossbeam_channel::bounded(0);
        Self {
            gate: HostSyncGate::new(),
            jobs: None,
            replies,
            pending: None,
            handle: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Start one host request. Fails with `HostBusy` while another is in flight.
    pub fn submit(&mut self, call: HostCall) -> Result<(), SyncError> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(SyncError::HostUnavailable);
        };
        let Some(guard) = self.gate.try_enter() else {
            warn!("Host busy, rejected {}", call.name());
            return Err(SyncError::HostBusy);
        };

        debug!("host <- {}", call.to_script());
        if jobs.send(call.clone()).is_err() {
            // guard dropped here
            error!("Host bridge thread is gone");
            return Err(SyncError::HostUnavailable);
        }
        self.pending = Some((call, guard));
        Ok(())
    }

    /// Non-blocking: take the reply of the outstanding request if it arrived.
    pub fn poll(&mut self) -> Option<HostResponse> {
        self.pending.as_ref()?;
        match self.replies.try_recv() {
            Ok(response) => {
                self.pending = None;
                Some(response)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.abandon_pending(),
        }
    }

    /// Blocking: wait for the reply of the outstanding request.
    ///
    /// Host requests have no timeout; this blocks until the host answers.
    pub fn wait(&mut self) -> Option<HostResponse> {
        self.pending.as_ref()?;
        match self.replies.recv() {
            Ok(response) => {
                self.pending = None;
                Some(response)
            }
            Err(_) => self.abandon_pending(),
        }
    }

    fn abandon_pending(&mut self) -> Option<HostResponse> {
        let (call, _guard) = self.pending.take()?;
        error!("Host bridge disconnected during {}", call.name());
        Some(HostResponse { call, result: Err(SyncError::HostUnavailable) })
    }
}

impl Drop for HostClient {
    fn drop(&mut self) {
        // Closing the job channel ends the bridge loop
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
