//! Core engine modules - store, host sync, events, editor
//!
//! These modules hold the editor state and talk to the host, independent of UI.

pub mod editor;
pub mod event_bus;
pub mod host;
pub mod offline_host;
pub mod store;
pub mod sync_gate;

// Re-exports for convenience
pub use editor::{Editor, Notice};
pub use event_bus::{EventBus, Subscription};
pub use host::{DuplicateMode, HostBridge, HostCall, HostClient, HostReply, HostResponse, SyncError};
pub use offline_host::OfflineHost;
pub use store::CompositionStore;
pub use sync_gate::{GateGuard, HostSyncGate};
