//! Unified error type for btrecon.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use crate::bt::DiscoveryPhase;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Registry
    /// A device with this address is already registered; update it instead.
    #[error("device already registered")]
    AlreadyExists,

    /// No registered device has this address.
    #[error("device not found")]
    NotFound,

    /// The registry is full. Nothing was modified.
    #[error("device registry exhausted")]
    ResourceExhausted,

    // Decoding
    /// Input length or layout not recognised.
    #[error("malformed input")]
    MalformedInput,

    // Session
    /// A discovery phase is still in flight.
    #[error("discovery busy ({0:?})")]
    Busy(DiscoveryPhase),

    /// Index does not refer to a registered device.
    #[error("no device at index {0}")]
    NoSuchDevice(usize),

    /// The radio stack refused a request.
    #[error("radio request failed: {0}")]
    Radio(RadioError),

    /// The event queue is full; the event was dropped.
    #[error("event queue full")]
    QueueFull,
}

/// Failure reported by the radio stack when a request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Raw status code from the vendor stack.
    #[error("status {0}")]
    Raw(i32),
    /// Controller not enabled.
    #[error("not ready")]
    NotReady,
}

// Convenience conversions

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Error::Radio(e)
    }
}
