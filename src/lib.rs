//! # fleetstate
//!
//! The state layer of a cluster workload orchestrator: the authoritative
//! model of machines, services, units, charms and relations, backed by a
//! coordination store, with a live change-notification protocol for many
//! concurrent observers.
//!
//! ## Core Concepts
//!
//! - **Multi-watcher engine** ([`multiwatcher`]): a revision-versioned
//!   in-memory mirror of the backing store's change stream. Any number of
//!   [`Watcher`](multiwatcher::Watcher)s each receive a consistent,
//!   gap-free delta stream via a blocking `next()`, without the backing
//!   store ever re-scanning on their behalf.
//! - **Constraints** ([`Constraints`]): the parseable, orderable hardware
//!   requirements that drive unit placement.
//! - **Bootstrap** ([`coord`]): the one-shot open/initialize handshake over
//!   the coordination service.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fleetstate::multiwatcher::StoreManager;
//!
//! let manager = StoreManager::new(backing);
//! let watcher = manager.watch();
//! while let Ok(deltas) = watcher.next().await {
//!     for delta in deltas {
//!         println!("{:?} removed={}", delta.entity, delta.removed);
//!     }
//! }
//! ```

pub mod config;
mod constraints;
pub mod coord;
mod entity;
mod errors;
pub mod multiwatcher;

pub use constraints::*;
pub use entity::*;
pub use errors::*;
