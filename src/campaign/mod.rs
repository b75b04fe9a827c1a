//! Campaign Orchestration Module
//!
//! One campaign = one bulk creation of N entities of a kind, spread over the whole cluster.
//!
//! ## Lifecycle
//! 1. **Resume**: [`finder`] locates the first unused index with a logarithmic number of probes.
//! 2. **Admit**: [`lock::CampaignLock`] lets exactly one campaign run cluster-wide.
//! 3. **Partition**: every node derives its own work range with [`partition`], no coordination needed.
//! 4. **Track**: [`progress`] stamps the record, logs milestones and publishes the outcome.
//!
//! ## Submodules
//! - **`service`**: the trigger/status interface tying the steps together.
//! - **`types`**: descriptor, record, ranges and status.
//! - **`protocol` / `handlers`**: the HTTP control surface.

pub mod finder;
pub mod handlers;
pub mod lock;
pub mod partition;
pub mod progress;
pub mod protocol;
pub mod service;
pub mod types;
