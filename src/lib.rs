//! SoundSync - beat-grid timeline for composition layers
//!
//! Re-exports all modules for use by binary targets.

// Core engine (store, host sync, events, editor)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod timeline;

// Re-export commonly used types from core
pub use core::editor::{Editor, Notice};
pub use core::event_bus::{EventBus, Subscription};
pub use core::host::{HostBridge, HostCall, HostClient, SyncError};
pub use core::store::CompositionStore;
pub use core::sync_gate::HostSyncGate;

// Re-export entities
pub use entities::{Composition, GridParameters, LayerGeometry, LayerRecord};
