//! Worker lifecycle state machine (§4.10): the validated progression a
//! deployed worker moves through from spawn to teardown.

use std::fmt;

/// A worker's position in its deploy/prepare/receive/teardown lifecycle.
///
/// `spawned -> ready -> running -> draining -> stopped`, matching the
/// per-worker state line of the design document's worker model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkerLifecycle {
    /// Just spawned; its `prepare` hook has not yet run.
    Spawned,
    /// `prepare` has completed and the mailbox is open.
    Ready,
    /// Actively dispatching a delivered message to `receive`.
    Running,
    /// Tear-down has begun; `drop_invocation` is in progress.
    Draining,
    /// `drop_deployment` has run; the worker no longer exists.
    Stopped,
}

impl fmt::Display for WorkerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerLifecycle::Spawned => "spawned",
            WorkerLifecycle::Ready => "ready",
            WorkerLifecycle::Running => "running",
            WorkerLifecycle::Draining => "draining",
            WorkerLifecycle::Stopped => "stopped",
        })
    }
}

/// An attempted transition that is not reachable from the state it was
/// tried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    from: WorkerLifecycle,
    to: WorkerLifecycle,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid worker lifecycle transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

impl WorkerLifecycle {
    /// Attempt to move from this state to `to`.
    ///
    /// # Errors
    /// Returns [`TransitionError`] if `to` is not reachable from `self`.
    pub fn transition(self, to: Self) -> Result<Self, TransitionError> {
        let valid = matches!(
            (self, to),
            (WorkerLifecycle::Spawned, WorkerLifecycle::Ready)
                | (WorkerLifecycle::Ready, WorkerLifecycle::Running)
                | (WorkerLifecycle::Ready, WorkerLifecycle::Draining)
                | (WorkerLifecycle::Running, WorkerLifecycle::Draining)
                | (WorkerLifecycle::Draining, WorkerLifecycle::Stopped)
        );
        if valid {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn the_happy_path_is_reachable_step_by_step() {
        let state = WorkerLifecycle::Spawned;
        let state = state.transition(WorkerLifecycle::Ready).unwrap();
        let state = state.transition(WorkerLifecycle::Running).unwrap();
        let state = state.transition(WorkerLifecycle::Draining).unwrap();
        let state = state.transition(WorkerLifecycle::Stopped).unwrap();
        assert_eq!(state, WorkerLifecycle::Stopped);
    }

    #[test]
    fn a_worker_can_be_torn_down_before_it_ever_runs() {
        let state = WorkerLifecycle::Ready.transition(WorkerLifecycle::Draining).unwrap();
        assert_eq!(state, WorkerLifecycle::Draining);
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let err = WorkerLifecycle::Spawned.transition(WorkerLifecycle::Running).unwrap_err();
        assert_eq!(err.to_string(), "invalid worker lifecycle transition: spawned -> running");
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(WorkerLifecycle::Stopped.transition(WorkerLifecycle::Ready).is_err());
        assert!(WorkerLifecycle::Stopped.transition(WorkerLifecycle::Running).is_err());
    }

    #[test]
    fn going_backwards_is_rejected() {
        assert!(WorkerLifecycle::Running.transition(WorkerLifecycle::Ready).is_err());
        assert!(WorkerLifecycle::Draining.transition(WorkerLifecycle::Running).is_err());
    }
}
