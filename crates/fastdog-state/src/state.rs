use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a model load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Downloading,
    Decoding,
    Building,
    Success,
    Error,
    Paused,
    Cancelled,
}

impl LoadingState {
    pub const ALL: [LoadingState; 9] = [
        LoadingState::Idle,
        LoadingState::Loading,
        LoadingState::Downloading,
        LoadingState::Decoding,
        LoadingState::Building,
        LoadingState::Success,
        LoadingState::Error,
        LoadingState::Paused,
        LoadingState::Cancelled,
    ];

    /// States reachable from `self` in one step.
    pub fn successors(self) -> &'static [LoadingState] {
        use LoadingState::*;
        match self {
            Idle => &[Loading],
            Loading => &[Loading, Downloading, Building, Success, Error, Cancelled],
            Downloading => &[Downloading, Decoding, Building, Success, Paused, Error, Cancelled],
            Decoding => &[Building, Error, Cancelled],
            Building => &[Success, Error, Cancelled],
            Paused => &[Downloading, Cancelled],
            Success | Error | Cancelled => &[Idle],
        }
    }

    pub fn can_transition_to(self, to: LoadingState) -> bool {
        self.successors().contains(&to)
    }

    /// Success, error and cancelled only lead back to idle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }

    /// Loading, downloading, decoding, building or paused.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Downloading | Self::Decoding | Self::Building | Self::Paused
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Downloading => "downloading",
            Self::Decoding => "decoding",
            Self::Building => "building",
            Self::Success => "success",
            Self::Error => "error",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
