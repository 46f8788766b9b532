//! Scheduler layer
//!
//! Fans a round's jobs out to concurrent tasks and collects their results
//! into the round's summary.

pub mod round;

pub use round::RoundCoordinator;
