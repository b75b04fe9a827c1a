//! Cluster Dispatch Module
//!
//! Carries one campaign from its initiator to every member and back.
//!
//! ## Flow
//! 1. The initiator broadcasts the immutable descriptor ([`broadcast::CampaignBroadcast`]).
//! 2. Each member's [`node::NodeRunner`] finds its ordinal in its own ordered view, computes
//!    its work range and hands it to the local batch executor.
//! 3. Each member answers with a [`types::NodeReport`]; the initiator logs every reply and
//!    [`broadcast::aggregate`] decides the campaign outcome.

pub mod broadcast;
pub mod handlers;
pub mod node;
pub mod protocol;
pub mod types;

#[cfg(test)]
mod tests;
