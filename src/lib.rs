//! Classic Bluetooth reconnaissance core for embedded wireless tools.
//!
//! Discovers nearby BR/EDR devices through a vendor radio stack, keeps a
//! deduplicated registry of what was seen and drives the inquiry →
//! service-discovery sequence. Everything here is pure logic over
//! fixed-capacity buffers, so it runs unchanged on target and on the host.
//!
//! The firmware that embeds this crate provides a [`bt::RadioStack`]
//! implementation, posts stack callbacks into a [`bt::pump::EventQueue`] and
//! spawns a task that runs [`bt::pump::EventQueue::run`].
//!
//! Usage: `cargo test` (host) or `cargo build --features defmt` (target)

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible below.
#[macro_use]
mod fmt;

pub mod bt;
pub mod config;
pub mod error;

pub use bt::format::{format_address, format_uuid};
pub use bt::registry::{Commit, DeviceRegistry};
pub use bt::{
    classify, BdAddr, ClassOfDevice, DeviceName, DeviceProperty, DiscoveredDevice,
    DiscoveryPhase, DiscoveryState, EventOutcome, IgnoreReason, InquiryMode, InquiryParams,
    MajorDeviceClass, PropertyKind, RadioStack, Recon, RemoteUuid, ServiceReport, ServiceStatus,
    SessionSnapshot, StackEvent, StackRequest,
};
pub use config::ReconConfig;
pub use error::{Error, RadioError};
