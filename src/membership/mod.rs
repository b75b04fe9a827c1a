//! Membership & Discovery Module
//!
//! Gossip-based membership (SWIM-like) over UDP. Nodes discover each other through
//! seeds, probe liveness with Ping/Ack and move silent peers through
//! Alive -> Suspect -> Dead.
//!
//! ## Why campaigns care
//! Bulk campaigns are partitioned without any coordination messages: every node sorts
//! the alive members by id and takes its own position in that list as its ordinal.
//! [`view::ClusterView`] is the narrow interface the campaign code consumes.

pub mod service;
pub mod types;
pub mod view;

#[cfg(test)]
mod tests;
