//! Data Transfer Objects for documents produced outside ecsub
//!
//! These mirror the JSON written by external tools and are converted into
//! domain facts before use.

pub mod execution_log;
