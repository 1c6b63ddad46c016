//! Shared operation state: the record, its transition table and its store.
//!
//! ```text
//!  process A ──save──▶ ┌──────────────────────────┐ ◀──load── process B
//!                      │ transcription_state.json │
//!  process A ◀──load── └──────────────────────────┘ ──save──▶ process B
//! ```
//!
//! Exactly one [`OperationState`] exists at a time. It is replaced whole on
//! every transition and never edited in place.

pub mod machine;
pub mod record;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use machine::Event;
pub use record::{
    OperationState, OperationStatus, Staleness, BUSY_STALE_AFTER, RECORDING_STALE_AFTER,
};
pub use store::{FileStore, MemoryStore, StateStore, StoreError, STATE_KEY};
