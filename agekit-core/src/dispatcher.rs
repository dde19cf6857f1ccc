//! Maps verification states to host callbacks.

use std::{fmt, str::FromStr, sync::Arc};

use crate::state::{FailureReason, VerificationState};

/// A host callback without arguments.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// The host callback for failures. Receives the reason of the failure.
pub type FailureCallback = Arc<dyn Fn(&FailureReason) + Send + Sync>;

/// The outcome of feeding one status value to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// `WaitingForScan`: no callback fired.
    Ignored,
    /// The scanning callback fired.
    Scanning,
    /// The success callback fired.
    Success,
    /// The user-rejection callback fired.
    RejectedByUser,
    /// The requirement-rejection callback fired.
    RejectedByRequirement,
    /// The timeout callback fired.
    Timeout,
    /// The generic failure callback fired.
    Failure(FailureReason),
}

impl Dispatch {
    /// Maps a raw `scanningState` value to its dispatch. Unknown values, including the empty
    /// failure sentinel, map to a failure.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        VerificationState::from_str(status).map_or_else(
            |_| Self::Failure(FailureReason::UnrecognizedState(status.to_string())),
            Self::from,
        )
    }

    /// Whether this dispatch ends the polling session.
    #[must_use]
    pub const fn stops_polling(&self) -> bool {
        !matches!(self, Self::Ignored | Self::Scanning)
    }
}

impl From<VerificationState> for Dispatch {
    fn from(state: VerificationState) -> Self {
        match state {
            VerificationState::WaitingForScan => Self::Ignored,
            VerificationState::Scanned => Self::Scanning,
            VerificationState::Approved => Self::Success,
            VerificationState::RejectedByUser => Self::RejectedByUser,
            VerificationState::RejectedByRequirement => Self::RejectedByRequirement,
            VerificationState::Timeout => Self::Timeout,
        }
    }
}

/// The validated set of host callbacks, one per non-waiting state plus the failure callback.
#[derive(Clone)]
pub struct VerificationCallbacks {
    pub(crate) on_success: Callback,
    pub(crate) on_failure: FailureCallback,
    pub(crate) on_scanning: Callback,
    pub(crate) on_rejected_by_user: Callback,
    pub(crate) on_rejected_by_requirements: Callback,
    pub(crate) on_timeout: Callback,
}

impl VerificationCallbacks {
    /// Invokes the callback matching `dispatch`. Exactly one callback fires, except for
    /// [`Dispatch::Ignored`] which fires none.
    pub fn fire(&self, dispatch: &Dispatch) {
        match dispatch {
            Dispatch::Ignored => {}
            Dispatch::Scanning => (self.on_scanning)(),
            Dispatch::Success => (self.on_success)(),
            Dispatch::RejectedByUser => (self.on_rejected_by_user)(),
            Dispatch::RejectedByRequirement => (self.on_rejected_by_requirements)(),
            Dispatch::Timeout => (self.on_timeout)(),
            Dispatch::Failure(reason) => (self.on_failure)(reason),
        }
    }
}

impl fmt::Debug for VerificationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationCallbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;

    fn recording_callbacks() -> (VerificationCallbacks, Arc<Mutex<Vec<String>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let record = |name: &'static str| -> Callback {
            let fired = Arc::clone(&fired);
            Arc::new(move || fired.lock().unwrap().push(name.to_string()))
        };
        let failures = Arc::clone(&fired);
        let callbacks = VerificationCallbacks {
            on_success: record("success"),
            on_failure: Arc::new(move |reason| {
                failures.lock().unwrap().push(format!("failure: {reason}"));
            }),
            on_scanning: record("scanning"),
            on_rejected_by_user: record("rejected_by_user"),
            on_rejected_by_requirements: record("rejected_by_requirements"),
            on_timeout: record("timeout"),
        };
        (callbacks, fired)
    }

    #[test_case("WaitingForScan", &[], false ; "waiting fires nothing")]
    #[test_case("Scanned", &["scanning"], false ; "scanned keeps polling")]
    #[test_case("Approved", &["success"], true ; "approved")]
    #[test_case("RejectedByUser", &["rejected_by_user"], true ; "rejected by user")]
    #[test_case("RejectedByRequirement", &["rejected_by_requirements"], true ; "rejected by requirement")]
    #[test_case("Timeout", &["timeout"], true ; "timeout")]
    #[test_case("", &["failure: unrecognized state ``"], true ; "empty sentinel")]
    #[test_case("Expired", &["failure: unrecognized state `Expired`"], true ; "unknown state")]
    fn test_status_fires_exactly_one_callback(status: &str, expected: &[&str], stops: bool) {
        let (callbacks, fired) = recording_callbacks();

        let dispatch = Dispatch::from_status(status);
        callbacks.fire(&dispatch);

        assert_eq!(*fired.lock().unwrap(), expected);
        assert_eq!(dispatch.stops_polling(), stops);
    }

    #[test]
    fn test_failure_reason_is_forwarded() {
        let (callbacks, fired) = recording_callbacks();

        callbacks.fire(&Dispatch::Failure(FailureReason::ServiceError(
            "expired".to_string(),
        )));

        assert_eq!(*fired.lock().unwrap(), vec!["failure: service error: expired"]);
    }
}
