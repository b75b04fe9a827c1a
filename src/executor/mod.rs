//! Local Batch Executor Module
//!
//! Turns a node's work range into committed entities.
//!
//! ## Architecture Overview
//! 1. **Slicing**: the range is cut into consecutive batches of `batch_size` indices.
//! 2. **Pool**: a bounded set of workers drains a pre-filled job queue.
//! 3. **Transaction**: each batch asks the registered factory for every entity, then hands
//!    the whole batch to the [`backend::EntityBackend`], which commits all of it or none.
//! 4. **Barrier**: the caller waits for every batch, then reports the total or the first failure.
//!
//! Removal campaigns reuse the same pool; each batch deletes its names instead of
//! building entities.
//!
//! ## Submodules
//! - **`executor`**: worker pool, result channel and join barrier.
//! - **`backend`**: the transactional collaborator trait and its in-memory implementation.
//! - **`cluster`**: routes backend calls to the member hosting the entity store.
//! - **`factory`**: maps entity kinds to factory closures.
//! - **`entities`**: the standard synthetic realm, client, user, session and event factories.
//! - **`protocol`** / **`handlers`**: the internal endpoint serving forwarded backend calls.

pub mod backend;
pub mod cluster;
pub mod entities;
pub mod executor;
pub mod factory;
pub mod handlers;
pub mod protocol;
pub mod types;

#[cfg(test)]
mod tests;
