//! Lease Store Module
//!
//! The shared TTL'd key-value slot behind the campaign lock.
//!
//! ## Core Concepts
//! - **Operations**: callers issue whole operations (`TryInsert`, `Get`, `Put`, `Remove`,
//!   `CompareAndRemove`) through the [`types::LeaseStore`] trait; there is no read-then-write path.
//! - **Placement**: `LeasePlacement` hashes a key to one of 256 partitions and picks a
//!   primary and a backup from the ordered membership view.
//! - **Ownership**: the primary applies the operation on its local map, which is what
//!   makes insert-if-absent atomic cluster-wide. Non-owners forward over HTTP with retries
//!   and an `op_id` so a retried forward is answered from the primary's outcome cache.
//! - **Expiry**: entries carry an absolute deadline; reads ignore expired entries and a
//!   background loop purges them.

pub mod cluster;
pub mod handlers;
pub mod memory;
pub mod placement;
pub mod protocol;
pub mod types;
