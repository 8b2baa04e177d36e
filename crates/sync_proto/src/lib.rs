//! Wire-agnostic data model and RPC boundary for the directory synchronizer.
//!
//! This crate holds everything two sides of a sync session must agree on -
//! digests, signatures, subpaths, mappings, actions, and the `RpcChannel`
//! trait they flow over - without committing to a concrete wire format.
//! Framing, transport bring-up, and authentication are non-goals; see
//! `sync_core` for the engine that drives this model and `sync_agent` for a
//! binary that wires a concrete channel to it.

pub mod action;
pub mod bytes;
pub mod channel;
pub mod error;
pub mod mapping;
pub mod signature;
pub mod subpath;

pub use action::Action;
pub use bytes::{Bytes, PermSet};
pub use channel::{LoopbackChannel, RpcChannel};
pub use error::SyncError;
pub use mapping::Mapping;
pub use signature::{Signature, BLOCK_SIZE};
pub use subpath::SubPath;
