use statig::prelude::*;
use thiserror::Error;

use super::job::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Assign { workers: Vec<String> },
    Start,
    Succeed,
    Fail { reason: String },
    Skip { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Job {job_id}: invalid transition from {from} with event {event:?}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        event: JobEvent,
    },
}

/// Forward-only job lifecycle: Pending -> Assigned -> Running -> Succeeded | Failed
///
/// Pending may also end directly in Failed (nothing could be assigned) or
/// Skipped (a dependency did not succeed).
#[derive(Debug, Default)]
pub struct JobLifecycle {
    pub job_id: String,
    pub status: JobStatus,
    pub workers: Vec<String>,
    pub error: Option<String>,
}

impl JobLifecycle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Default::default()
        }
    }
}

#[state_machine(initial = "State::pending()")]
impl JobLifecycle {
    #[state]
    fn pending(&mut self, event: &JobEvent) -> Outcome<State> {
        match event {
            JobEvent::Assign { workers } => {
                self.workers = workers.clone();
                self.status = JobStatus::Assigned;
                tracing::debug!(job_id = %self.job_id, workers = ?workers, "Job assigned");
                Transition(State::assigned())
            }
            JobEvent::Fail { reason } => {
                self.fail(reason);
                Transition(State::failed())
            }
            JobEvent::Skip { reason } => {
                self.error = Some(reason.clone());
                self.status = JobStatus::Skipped;
                tracing::info!(job_id = %self.job_id, reason = %reason, "Job skipped");
                Transition(State::skipped())
            }
            _ => Handled,
        }
    }

    #[state]
    fn assigned(&mut self, event: &JobEvent) -> Outcome<State> {
        match event {
            JobEvent::Start => {
                self.status = JobStatus::Running;
                tracing::debug!(job_id = %self.job_id, "Job running");
                Transition(State::running())
            }
            JobEvent::Fail { reason } => {
                self.fail(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn running(&mut self, event: &JobEvent) -> Outcome<State> {
        match event {
            JobEvent::Succeed => {
                self.status = JobStatus::Succeeded;
                tracing::info!(job_id = %self.job_id, "Job succeeded");
                Transition(State::succeeded())
            }
            JobEvent::Fail { reason } => {
                self.fail(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn succeeded(&mut self) -> Outcome<State> {
        Handled
    }

    #[state]
    fn failed(&mut self) -> Outcome<State> {
        Handled
    }

    #[state]
    fn skipped(&mut self) -> Outcome<State> {
        Handled
    }
}

impl JobLifecycle {
    fn fail(&mut self, reason: &str) {
        self.error = Some(reason.to_string());
        self.status = JobStatus::Failed;
        tracing::warn!(job_id = %self.job_id, error = %reason, "Job failed");
    }
}

/// Wraps the state machine and reports ignored events as errors
pub struct JobTracker {
    machine: StateMachine<JobLifecycle>,
}

impl JobTracker {
    pub fn new(job_id: &str) -> Self {
        Self {
            machine: JobLifecycle::new(job_id).state_machine(),
        }
    }

    pub fn apply(&mut self, event: JobEvent) -> Result<JobStatus, TransitionError> {
        let before = self.status();
        self.machine.handle(&event);
        let after = self.status();
        if before == after {
            return Err(TransitionError::InvalidTransition {
                job_id: self.machine.inner().job_id.clone(),
                from: before,
                event,
            });
        }
        Ok(after)
    }

    pub fn status(&self) -> JobStatus {
        self.machine.inner().status
    }

    pub fn workers(&self) -> &[String] {
        &self.machine.inner().workers
    }

    pub fn error(&self) -> Option<&str> {
        self.machine.inner().error.as_deref()
    }
}
