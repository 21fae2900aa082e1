//! Module system — independent behaviors that share only the store.
//!
//! A module implements [`Module`], holds a [`ModuleContext`] for its store
//! access and documents the keys it reads and writes. The [`ModuleHost`]
//! starts modules, ticks them once per frame and stops them.
//!
//! # Architecture
//!
//! ```text
//! RemoteWriter (other threads)
//!   ↓  queued
//! ModuleHost::tick()
//!   ├─ Inbox::drain()          apply queued writes
//!   ├─ sensor modules          write raw keys
//!   ├─ classifier modules      read raw keys, write intent keys
//!   └─ behavior modules        react to intent keys
//! ```

pub mod error;
pub mod host;
pub mod module;

pub use error::ModuleError;
pub use host::ModuleHost;
pub use module::{DisplayHook, Module, ModuleContext};
