use thiserror::Error;

use crate::state::LoadingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: LoadingState, to: LoadingState },

    #[error("progress updates are not accepted while {state}")]
    ProgressRejected { state: LoadingState },
}

pub type Result<T> = std::result::Result<T, StateError>;
