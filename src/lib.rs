//! dictation-relay: cross-process coordination of a record → upload →
//! transcript operation.
//!
//! A capture-capable primary process and any number of observer processes
//! (e.g. a keyboard surface) share one [`state::OperationState`] record
//! through a [`state::StateStore`] and nudge each other with payload-less
//! [`wake`] signals. Each process runs a [`coordinator::Coordinator`] that
//! reconciles its local behaviour with the shared record.
//!
//! # Modules
//!
//! | Module          | Responsibility                                           |
//! |-----------------|----------------------------------------------------------|
//! | [`state`]       | shared record, transition table, single-slot store       |
//! | [`wake`]        | best-effort cross-process wake signals                   |
//! | [`upload`]      | multipart request building, sending, response parsing    |
//! | [`audio`]       | microphone capture and WAV encoding                      |
//! | [`coordinator`] | per-process event loop and reconciliation                |
//! | [`config`]      | `settings.toml`, paths, per-attempt upload settings      |
//! | [`credentials`] | secret storage for API keys and auth headers             |

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod state;
pub mod upload;
pub mod wake;
