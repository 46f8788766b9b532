//! Job lifecycle states
//!
//! `Pending -> Launching -> Running -> Completed`, or
//! `Pending -> Launching -> LaunchFailed`.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Lifecycle state of a single job within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Launching,
    Running,
    Completed,
    LaunchFailed,
}

impl JobState {
    /// Check if transition is valid
    pub fn can_transition_to(self, to: JobState) -> bool {
        matches!(
            (self, to),
            (JobState::Pending, JobState::Launching)
                | (JobState::Launching, JobState::Running)
                | (JobState::Launching, JobState::LaunchFailed)
                | (JobState::Running, JobState::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::LaunchFailed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "Pending"),
            JobState::Launching => write!(f, "Launching"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::LaunchFailed => write!(f, "LaunchFailed"),
        }
    }
}

/// State tracker for one job index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLifecycle {
    index: usize,
    state: JobState,
}

impl JobLifecycle {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: JobState::Pending,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Moves to `to`, rejecting transitions the lifecycle does not allow
    pub fn advance(&mut self, to: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(TransitionError {
                index: self.index,
                from: self.state,
                to,
            });
        }

        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(JobState::Pending.can_transition_to(JobState::Launching));
        assert!(JobState::Launching.can_transition_to(JobState::Running));
        assert!(JobState::Launching.can_transition_to(JobState::LaunchFailed));
        assert!(JobState::Running.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!JobState::Pending.can_transition_to(JobState::Running));
        assert!(!JobState::Running.can_transition_to(JobState::LaunchFailed));
        assert!(!JobState::Completed.can_transition_to(JobState::Launching));
        assert!(!JobState::LaunchFailed.can_transition_to(JobState::Launching));
        assert!(!JobState::Pending.can_transition_to(JobState::Pending));
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut job = JobLifecycle::new(2);
        job.advance(JobState::Launching).unwrap();
        job.advance(JobState::Running).unwrap();
        job.advance(JobState::Completed).unwrap();
        assert!(job.state().is_terminal());
    }

    #[test]
    fn test_lifecycle_rejects_skipping_launch() {
        let mut job = JobLifecycle::new(5);
        let err = job.advance(JobState::Completed).unwrap_err();
        assert_eq!(err.index, 5);
        assert_eq!(err.from, JobState::Pending);
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(err.to_string(), "job 5: invalid transition Pending -> Completed");
    }
}
