//! Consultation lifecycle state machine.
//!
//! All status transitions live here as a pure function over
//! `(current status, event)`. The orchestrator decides *when* events fire;
//! this module decides *whether* they are legal and what status results.
//! Terminal rule: `failed` accepts no event, and nothing moves backwards
//! except the bureau re-reporting an authenticated subject as rejected,
//! which keeps the current status rather than regressing it.

use crate::models::ConsultationStatus;
use std::fmt;

/// One logical pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticate,
    FetchReport,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Authenticate => write!(f, "authenticate"),
            Stage::FetchReport => write!(f, "fetch-report"),
        }
    }
}

/// Outcome of a stage's external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Authenticator accepted the subject's identity.
    AuthAccepted,
    /// Authenticator answered 2xx but reported the subject as not
    /// authenticated. Recoverable; not an error.
    AuthRejected,
    /// All three report calls succeeded.
    ReportFetched,
    /// A call in the active stage raised an unrecoverable error.
    StageFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The consultation already failed; callers must start a new one.
    TerminalFailure,
    /// The consultation is already completed and the stage cannot rerun.
    AlreadyCompleted,
    /// fetch-report requires a prior successful authentication.
    NotAuthenticated,
    /// Event makes no sense for the current status.
    InvalidEvent(ConsultationStatus, Event),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::TerminalFailure => {
                write!(f, "consultation failed; submit a new consultation")
            }
            TransitionError::AlreadyCompleted => {
                write!(f, "consultation already completed")
            }
            TransitionError::NotAuthenticated => {
                write!(f, "consultation must be authenticated before fetching the report")
            }
            TransitionError::InvalidEvent(status, event) => {
                write!(f, "event {:?} invalid in status {}", event, status)
            }
        }
    }
}

/// May `stage` start while the consultation is in `status`?
///
/// Checked before any external call is issued, so an illegal invocation
/// costs nothing and mutates nothing.
pub fn can_start(status: ConsultationStatus, stage: Stage) -> Result<(), TransitionError> {
    match (status, stage) {
        (ConsultationStatus::Failed, _) => Err(TransitionError::TerminalFailure),
        (ConsultationStatus::Pending, Stage::Authenticate) => Ok(()),
        (ConsultationStatus::Authenticated, Stage::Authenticate) => Ok(()),
        (ConsultationStatus::Completed, Stage::Authenticate) => {
            Err(TransitionError::AlreadyCompleted)
        }
        (ConsultationStatus::Pending, Stage::FetchReport) => {
            Err(TransitionError::NotAuthenticated)
        }
        // Completed allows an idempotent re-fetch that overwrites the slots.
        (ConsultationStatus::Authenticated | ConsultationStatus::Completed, Stage::FetchReport) => {
            Ok(())
        }
    }
}

/// Apply `event` to `status`, yielding the next status.
pub fn transition(
    status: ConsultationStatus,
    event: Event,
) -> Result<ConsultationStatus, TransitionError> {
    match (status, event) {
        (ConsultationStatus::Failed, _) => Err(TransitionError::TerminalFailure),

        (ConsultationStatus::Pending, Event::AuthAccepted) => Ok(ConsultationStatus::Authenticated),
        (ConsultationStatus::Pending, Event::AuthRejected) => Ok(ConsultationStatus::Pending),
        (ConsultationStatus::Authenticated, Event::AuthAccepted) => {
            Ok(ConsultationStatus::Authenticated)
        }
        // A re-auth rejection does not regress an already-accepted identity.
        (ConsultationStatus::Authenticated, Event::AuthRejected) => {
            Ok(ConsultationStatus::Authenticated)
        }

        (ConsultationStatus::Authenticated, Event::ReportFetched)
        | (ConsultationStatus::Completed, Event::ReportFetched) => {
            Ok(ConsultationStatus::Completed)
        }

        (
            ConsultationStatus::Pending
            | ConsultationStatus::Authenticated
            | ConsultationStatus::Completed,
            Event::StageFailed,
        ) => Ok(ConsultationStatus::Failed),

        (status, event) => Err(TransitionError::InvalidEvent(status, event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStatus::*;

    #[test]
    fn pending_advances_on_acceptance() {
        assert_eq!(transition(Pending, Event::AuthAccepted), Ok(Authenticated));
    }

    #[test]
    fn subject_rejection_keeps_pending() {
        assert_eq!(transition(Pending, Event::AuthRejected), Ok(Pending));
    }

    #[test]
    fn failed_is_terminal_for_every_event() {
        for event in [
            Event::AuthAccepted,
            Event::AuthRejected,
            Event::ReportFetched,
            Event::StageFailed,
        ] {
            assert_eq!(
                transition(Failed, event),
                Err(TransitionError::TerminalFailure)
            );
        }
    }

    #[test]
    fn report_requires_authentication() {
        assert_eq!(
            can_start(Pending, Stage::FetchReport),
            Err(TransitionError::NotAuthenticated)
        );
        assert_eq!(can_start(Authenticated, Stage::FetchReport), Ok(()));
    }

    #[test]
    fn completed_allows_refetch_but_not_reauth() {
        assert_eq!(can_start(Completed, Stage::FetchReport), Ok(()));
        assert_eq!(
            can_start(Completed, Stage::Authenticate),
            Err(TransitionError::AlreadyCompleted)
        );
        assert_eq!(transition(Completed, Event::ReportFetched), Ok(Completed));
    }

    #[test]
    fn any_active_stage_can_fail() {
        assert_eq!(transition(Pending, Event::StageFailed), Ok(Failed));
        assert_eq!(transition(Authenticated, Event::StageFailed), Ok(Failed));
        assert_eq!(transition(Completed, Event::StageFailed), Ok(Failed));
    }

    #[test]
    fn report_fetch_never_legal_from_pending() {
        assert_eq!(
            transition(Pending, Event::ReportFetched),
            Err(TransitionError::InvalidEvent(Pending, Event::ReportFetched))
        );
    }
}
