//! Incremental synchronization engine core.
//!
//! This crate is the hard engineering behind the directory synchronizer:
//! the filesystem-event debouncer, content-addressed signature computation,
//! the VFS shadow state kept in sync with a remote, the change-planner that
//! turns pairs of (local, remote) signatures into an ordered action stream,
//! and block-level file-content streaming with cache-aware elision.
//!
//! The remote agent's mutation executor, the OS-specific watcher source,
//! transport bring-up, and the wire encoding are all out of scope - see
//! `sync_proto::channel::RpcChannel` for the boundary this crate calls
//! through, and `sync_agent` for a binary that wires a concrete channel in.

pub mod debounce;
pub mod metadata;
pub mod orchestrator;
pub mod planner;
pub mod scanner;
pub mod sigcompute;
pub mod skip;
pub mod vfs;

pub use debounce::EventQueue;
pub use orchestrator::{Orchestrator, StopHandle};
pub use planner::{plan, DiffTriple};
pub use scanner::{scan_signatures, BufferPool};
pub use skip::{DotGitSkip, GlobSkip, NoneSkip, SkipPredicate};
pub use vfs::{Node, Vfs};
