//! Execution error vocabulary
//!
//! The error tags returned to the voice assistant form a closed contract:
//! every failure of an `execute` call surfaces as exactly one short opaque
//! string. The assistant envelope layer maps the tag to its response field,
//! so the strings here must never be rewritten.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for engine-level operations.
pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// Errors raised by the command execution engine.
///
/// `Display` renders the wire tag verbatim (see [`ExecuteError::tag`]).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The device's `states.online` flag is false (or missing).
    #[error("deviceOffline")]
    DeviceOffline,

    /// The device requires a simple acknowledgment and none was supplied.
    #[error("ackNeeded")]
    AckNeeded,

    /// The device requires a PIN and no challenge was supplied.
    #[error("pinNeeded")]
    PinNeeded,

    /// A PIN was supplied but does not match the device's expected value.
    #[error("challengeFailedPinNeeded")]
    ChallengeFailedPinNeeded,

    /// The command payload is missing a recognized variant (e.g. a
    /// `ColorAbsolute` color map with none of the known spectra).
    #[error("notSupported")]
    NotSupported,

    /// The command identifier is not in the dispatch table.
    #[error("commandNotSupported")]
    CommandNotSupported,

    /// A Timer command other than `TimerStart` ran against a device with no
    /// active timer (`timerRemainingSec == -1`).
    #[error("noTimerExists")]
    NoTimerExists,

    /// A parameter would push a state value outside its legal range.
    #[error("valueOutOfRange")]
    ValueOutOfRange,

    /// An error code injected on the device document, raised verbatim.
    #[error("{0}")]
    DeviceError(String),

    /// No user matched the presented access token.
    #[error("noUser")]
    NoUser,

    /// The document store failed or the document is unusable.
    #[error("storeUnavailable")]
    Store(#[from] StoreError),
}

impl ExecuteError {
    /// The opaque tag string surfaced to the assistant.
    pub fn tag(&self) -> &str {
        match self {
            ExecuteError::DeviceOffline => "deviceOffline",
            ExecuteError::AckNeeded => "ackNeeded",
            ExecuteError::PinNeeded => "pinNeeded",
            ExecuteError::ChallengeFailedPinNeeded => "challengeFailedPinNeeded",
            ExecuteError::NotSupported => "notSupported",
            ExecuteError::CommandNotSupported => "commandNotSupported",
            ExecuteError::NoTimerExists => "noTimerExists",
            ExecuteError::ValueOutOfRange => "valueOutOfRange",
            ExecuteError::DeviceError(code) => code,
            ExecuteError::NoUser => "noUser",
            ExecuteError::Store(_) => "storeUnavailable",
        }
    }
}
