//! Application-wide constants and runtime configuration.
//!
//! Buffer capacities, inquiry parameters and the service-discovery
//! deadline live here so they can be tuned in one place.

use crate::bt::InquiryMode;

// Registry

/// Maximum number of devices the registry holds for one session.
pub const MAX_DISCOVERED_DEVICES: usize = 32;

/// Longest remote name the radio stack reports (bytes).
pub const MAX_BDNAME_LEN: usize = 248;

/// Stored/displayed name length (bytes). Longer names are truncated.
pub const DEVICE_NAME_CAP: usize = 63;

/// Maximum EIR blob retained per device (bytes).
pub const EIR_DATA_LEN: usize = 240;

/// Sentinel signal strength for "not yet observed".
pub const RSSI_UNKNOWN: i8 = -127;

// Inquiry

/// Inquiry duration in 1.28 s units. 0x30 = ~61 s.
pub const INQUIRY_DURATION: u8 = 0x30;

/// Number of inquiry responses before the controller stops. 0 = unlimited.
pub const INQUIRY_NUM_RSP: u8 = 0;

/// Maximum properties carried by a single device-found event.
pub const MAX_DEVICE_PROPERTIES: usize = 4;

// Service discovery

/// Maximum service identifiers kept from one service-discovery result.
pub const MAX_SERVICE_UUIDS: usize = 16;

/// Ticks (~1 s each) to wait for a service-discovery result.
pub const SERVICE_DISCOVERY_TIMEOUT_TICKS: u32 = 10;

// Event queue

/// Depth of the queue between the radio callback and the dispatcher.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Runtime parameters for a [`Recon`](crate::bt::Recon) instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReconConfig {
    pub inquiry_mode: InquiryMode,
    /// Inquiry length in 1.28 s units.
    pub inquiry_duration: u8,
    /// Response limit, 0 for unlimited.
    pub inquiry_num_rsp: u8,
    /// Ticks before a pending service discovery is abandoned. `None` waits forever.
    pub service_timeout_ticks: Option<u32>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            inquiry_mode: InquiryMode::General,
            inquiry_duration: INQUIRY_DURATION,
            inquiry_num_rsp: INQUIRY_NUM_RSP,
            service_timeout_ticks: Some(SERVICE_DISCOVERY_TIMEOUT_TICKS),
        }
    }
}
