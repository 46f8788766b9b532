//! Core domain types
//!
//! The structures describing a batch's cluster resources, the jobs it runs
//! and the summary persisted after each round. Shared by the controller (which
//! drives provisioning) and the CLI (which reads summaries back).

pub mod job;
pub mod resource;
pub mod state;
pub mod summary;
