//! ecsub Core
//!
//! Core types and rules for the ecsub batch submission system.
//!
//! This crate contains:
//! - Domain types: resource descriptor, job results, run summaries, job states
//! - DTOs: documents produced by external tools (execution logs)
//! - Cost model: elapsed-time and price accounting for a round
//! - Submission configuration and its named defaults
//!
//! Note: file persistence lives in the controller, cloud calls in the provider.

pub mod config;
pub mod cost;
pub mod domain;
pub mod dto;
pub mod error;
pub mod timefmt;

pub use error::{ConfigError, TransitionError};
