//! Repository layer
//!
//! Repositories read and write the documents a batch leaves on local disk:
//! one summary per round and one execution log per job. They hold no
//! business logic.
//!
//! The summary store is trait-based so the scheduler can be tested without a
//! real working directory.

mod execution_log;
mod summary;

pub use execution_log::read_execution_log;
pub use summary::{FsSummaryStore, SummaryStore};
