//! Cluster-Wide Dataset Provisioning Library
//!
//! This library crate defines the modules that make up a dataset provisioning node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of five loosely coupled subsystems plus shared configuration:
//!
//! - **`campaign`**: Campaign orchestration. Finds where the previous campaign stopped,
//!   admits one campaign at a time cluster-wide, partitions the work and tracks progress.
//! - **`cluster`**: Descriptor broadcast from the initiator to every member, the per-node
//!   runner and aggregation of the replies.
//! - **`executor`**: Bounded-concurrency batch execution against the entity backend, with
//!   one transaction per batch and a join barrier before errors surface. Backend calls are
//!   routed to the single member hosting the entity store.
//! - **`membership`**: The cluster coordination layer. Uses a UDP-based Gossip protocol
//!   (SWIM-like) for discovery and failure detection, and exposes an ordered member view.
//! - **`storage`**: The shared lease store holding the campaign lock. Entries are
//!   partitioned over the members with a primary and a backup owner.

pub mod campaign;
pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod membership;
pub mod storage;
