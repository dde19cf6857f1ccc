use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A `VerificationState` is one of the stages a QR code goes through on the verification service.
///
/// The wire representation is the variant name verbatim (e.g. `RejectedByUser`), as reported in
/// the `scanningState` field of a status check.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    EnumIter,
    AsRefStr,
    Display,
    Serialize,
    Deserialize,
)]
pub enum VerificationState {
    /// The QR code was issued and nobody scanned it yet. Initial state, never rendered.
    WaitingForScan,
    /// The QR code was scanned and the holder is reviewing the request.
    Scanned,
    /// The holder shared a credential that satisfies the age requirement.
    Approved,
    /// The holder declined to share their credential.
    RejectedByUser,
    /// The holder's credential does not satisfy the host's requirements.
    RejectedByRequirement,
    /// The QR code expired before completion.
    Timeout,
}

impl VerificationState {
    /// Whether a status check in this state ends the polling session.
    ///
    /// Every state except `WaitingForScan` and `Scanned` is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::WaitingForScan | Self::Scanned)
    }
}

/// Why the failure callback fired.
///
/// The failure callback is reached through several paths; the reason lets the host tell them
/// apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The service reported a `scanningState` that is not one of the known states. Also used for
    /// the empty failure sentinel.
    UnrecognizedState(String),
    /// The service answered with an `error` field instead of a scanning state.
    ServiceError(String),
    /// The request never produced a readable response.
    Transport(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnrecognizedState(state) => write!(f, "unrecognized state `{state}`"),
            Self::ServiceError(error) => write!(f, "service error: {error}"),
            Self::Transport(error) => write!(f, "transport failure: {error}"),
        }
    }
}
