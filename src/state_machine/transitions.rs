//! Transition table for the decommission pipeline.
//!
//! Every in-flight state maps to exactly one pipeline step; each step has a
//! success successor and a paired failure state. Keeping the table in one
//! place gives exhaustive-match coverage over [`RecycleState`].

use super::states::RecycleState;
use crate::error::{PoolError, Result};

/// The externally-fulfilled steps a recall detail passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecycleStep {
    PreCheck,
    ClearCheck,
    Reinstall,
    Initialize,
    DataDelete,
    ConfCheck,
    Transit,
}

impl RecycleStep {
    /// The step a detail in the given state is currently working through,
    /// if any. Failed and terminal states have no active step.
    pub fn for_state(state: RecycleState) -> Option<Self> {
        match state {
            RecycleState::Returned | RecycleState::PreChecking => Some(Self::PreCheck),
            RecycleState::ClearChecking => Some(Self::ClearCheck),
            RecycleState::Reinstalling => Some(Self::Reinstall),
            RecycleState::Initializing => Some(Self::Initialize),
            RecycleState::DataDeleting => Some(Self::DataDelete),
            RecycleState::ConfChecking => Some(Self::ConfCheck),
            RecycleState::Transiting => Some(Self::Transit),
            RecycleState::PreCheckFailed
            | RecycleState::ClearCheckFailed
            | RecycleState::ReinstallFailed
            | RecycleState::InitializeFailed
            | RecycleState::DataDeleteFailed
            | RecycleState::ConfCheckFailed
            | RecycleState::TransitFailed
            | RecycleState::Done
            | RecycleState::Terminate => None,
        }
    }

    /// State the detail enters once this step's external job succeeds.
    pub fn on_success(self) -> RecycleState {
        match self {
            Self::PreCheck => RecycleState::ClearChecking,
            Self::ClearCheck => RecycleState::Reinstalling,
            Self::Reinstall => RecycleState::Initializing,
            Self::Initialize => RecycleState::DataDeleting,
            Self::DataDelete => RecycleState::ConfChecking,
            Self::ConfCheck => RecycleState::Transiting,
            Self::Transit => RecycleState::Done,
        }
    }

    /// Paired failure state of this step.
    pub fn on_failure(self) -> RecycleState {
        match self {
            Self::PreCheck => RecycleState::PreCheckFailed,
            Self::ClearCheck => RecycleState::ClearCheckFailed,
            Self::Reinstall => RecycleState::ReinstallFailed,
            Self::Initialize => RecycleState::InitializeFailed,
            Self::DataDelete => RecycleState::DataDeleteFailed,
            Self::ConfCheck => RecycleState::ConfCheckFailed,
            Self::Transit => RecycleState::TransitFailed,
        }
    }

    /// In-flight state a resumed detail re-enters when its step is
    /// re-attempted after a failure.
    pub fn running_state(self) -> RecycleState {
        match self {
            Self::PreCheck => RecycleState::PreChecking,
            Self::ClearCheck => RecycleState::ClearChecking,
            Self::Reinstall => RecycleState::Reinstalling,
            Self::Initialize => RecycleState::Initializing,
            Self::DataDelete => RecycleState::DataDeleting,
            Self::ConfCheck => RecycleState::ConfChecking,
            Self::Transit => RecycleState::Transiting,
        }
    }
}

/// Map a failed state back to the step it belongs to, for the resume path.
pub fn step_for_failed(state: RecycleState) -> Result<RecycleStep> {
    match state {
        RecycleState::PreCheckFailed => Ok(RecycleStep::PreCheck),
        RecycleState::ClearCheckFailed => Ok(RecycleStep::ClearCheck),
        RecycleState::ReinstallFailed => Ok(RecycleStep::Reinstall),
        RecycleState::InitializeFailed => Ok(RecycleStep::Initialize),
        RecycleState::DataDeleteFailed => Ok(RecycleStep::DataDelete),
        RecycleState::ConfCheckFailed => Ok(RecycleStep::ConfCheck),
        RecycleState::TransitFailed => Ok(RecycleStep::Transit),
        other => Err(PoolError::StateTransition(format!(
            "{other} is not a failed state"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_chain_has_no_gaps() {
        // Walking success transitions from the initial state must visit
        // every step exactly once and end at Done.
        let mut state = RecycleState::Returned;
        let mut steps = Vec::new();
        while let Some(step) = RecycleStep::for_state(state) {
            steps.push(step);
            state = step.on_success();
        }
        assert_eq!(state, RecycleState::Done);
        assert_eq!(
            steps,
            vec![
                RecycleStep::PreCheck,
                RecycleStep::ClearCheck,
                RecycleStep::Reinstall,
                RecycleStep::Initialize,
                RecycleStep::DataDelete,
                RecycleStep::ConfCheck,
                RecycleStep::Transit,
            ]
        );
    }

    #[test]
    fn test_every_step_pairs_with_a_failed_state() {
        let steps = [
            RecycleStep::PreCheck,
            RecycleStep::ClearCheck,
            RecycleStep::Reinstall,
            RecycleStep::Initialize,
            RecycleStep::DataDelete,
            RecycleStep::ConfCheck,
            RecycleStep::Transit,
        ];
        for step in steps {
            let failed = step.on_failure();
            assert!(failed.is_failed());
            assert_eq!(step_for_failed(failed).unwrap(), step);
            assert_eq!(RecycleStep::for_state(step.running_state()), Some(step));
        }
    }

    #[test]
    fn test_terminal_states_have_no_step() {
        assert_eq!(RecycleStep::for_state(RecycleState::Done), None);
        assert_eq!(RecycleStep::for_state(RecycleState::Terminate), None);
        assert_eq!(RecycleStep::for_state(RecycleState::ReinstallFailed), None);
    }

    #[test]
    fn test_step_for_failed_rejects_in_flight() {
        assert!(step_for_failed(RecycleState::Reinstalling).is_err());
    }
}
