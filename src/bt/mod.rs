//! Classic Bluetooth reconnaissance.
//!
//! Discovery runs in two phases driven by events from the vendor stack:
//!
//! 1. **Inquiry** - device-found events are decoded (class of device,
//!    name, EIR) and committed to the [`registry::DeviceRegistry`].
//! 2. **Service discovery** - once inquiry stops and at least one device
//!    is known, one target device is asked for its service identifiers.
//!
//! The radio stack is reached through the [`RadioStack`] trait; events come
//! back as [`StackEvent`] values, usually through a [`pump::EventQueue`].

pub mod cod;
pub mod discovery;
pub mod eir;
pub mod format;
pub mod pump;
pub mod registry;


use core::fmt;

use heapless::{String, Vec};

use crate::config::{
    DEVICE_NAME_CAP, EIR_DATA_LEN, MAX_BDNAME_LEN, MAX_DEVICE_PROPERTIES, MAX_SERVICE_UUIDS,
    RSSI_UNKNOWN,
};
use crate::error::{Error, RadioError};

pub use cod::{classify, MajorDeviceClass};
pub use discovery::{
    DiscoveryPhase, Dispatcher, EventOutcome, IgnoreReason, Recon, ServiceReport, ServiceStatus,
    SessionSnapshot, StackRequest,
};

/// 6-byte Bluetooth device address, in the byte order the stack delivers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Build an address from a slice that must be exactly 6 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let raw: [u8; 6] = bytes.try_into().map_err(|_| Error::MalformedInput)?;
        Ok(Self(raw))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    fn format(&self, f: defmt::Formatter) {
        let text = format::address_string(self);
        defmt::write!(f, "{=str}", text.as_str())
    }
}

/// Raw 32-bit Class of Device value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassOfDevice(pub u32);

impl ClassOfDevice {
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Major-device category, computed on demand.
    pub fn major(&self) -> MajorDeviceClass {
        classify(self.0)
    }

    /// Format-type bits (0..1) must be zero for the layout to be valid.
    pub const fn is_valid_format(&self) -> bool {
        self.0 & 0x3 == 0
    }

    /// Major service class bits (13..23), unshifted.
    pub const fn major_service_bits(&self) -> u32 {
        self.0 & 0x00FF_E000
    }
}

/// Display name, truncated to [`DEVICE_NAME_CAP`] bytes.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DeviceName(String<DEVICE_NAME_CAP>);

impl DeviceName {
    /// Decode a raw name. Stops at the first NUL, replaces invalid UTF-8
    /// with `?` and drops whatever does not fit. Empty names yield `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let bytes = &bytes[..end.min(MAX_BDNAME_LEN)];

        let mut name: String<DEVICE_NAME_CAP> = String::new();
        'decode: for chunk in bytes.utf8_chunks() {
            for c in chunk.valid().chars() {
                if name.push(c).is_err() {
                    break 'decode;
                }
            }
            if !chunk.invalid().is_empty() && name.push('?').is_err() {
                break;
            }
        }

        if name.is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceName {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// One entry per physical device, keyed by address.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredDevice {
    /// Dedup key; never changes after insertion.
    pub address: BdAddr,
    pub name: Option<DeviceName>,
    pub class_of_device: ClassOfDevice,
    /// Most recent RSSI (dBm), [`RSSI_UNKNOWN`] until observed.
    pub rssi: i8,
    /// Raw EIR, kept for lazy name recovery.
    pub eir: Vec<u8, EIR_DATA_LEN>,
}

impl DiscoveredDevice {
    pub fn new(address: BdAddr) -> Self {
        Self {
            address,
            name: None,
            class_of_device: ClassOfDevice::default(),
            rssi: RSSI_UNKNOWN,
            eir: Vec::new(),
        }
    }

    /// Build a candidate record from the properties of a device-found event.
    /// The name is only taken from a direct name property here; EIR
    /// recovery is deferred to [`resolve_name`](Self::resolve_name).
    pub fn from_properties(address: BdAddr, properties: &[DeviceProperty]) -> Self {
        let mut device = Self::new(address);
        for property in properties {
            match property {
                DeviceProperty::ClassOfDevice(cod) => device.class_of_device = *cod,
                DeviceProperty::Rssi(rssi) => device.rssi = *rssi,
                DeviceProperty::Name(name) => device.name = Some(name.clone()),
                DeviceProperty::Eir(eir) => device.eir = eir.clone(),
            }
        }
        device
    }

    /// Fill in the name from EIR if no direct name was supplied.
    /// Returns `true` if a name was recovered.
    pub fn resolve_name(&mut self) -> bool {
        if self.name.is_some() || self.eir.is_empty() {
            return false;
        }
        self.name = eir::extract_name(&self.eir);
        self.name.is_some()
    }

    pub fn major_class(&self) -> MajorDeviceClass {
        self.class_of_device.major()
    }

    pub fn has_rssi(&self) -> bool {
        self.rssi != RSSI_UNKNOWN
    }

    /// Name for display, or the empty string.
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map(DeviceName::as_str).unwrap_or("")
    }
}

/// Property kinds the stack attaches to a device-found event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PropertyKind {
    ClassOfDevice,
    Rssi,
    Name,
    Eir,
}

/// Typed device-found property.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceProperty {
    ClassOfDevice(ClassOfDevice),
    Rssi(i8),
    Name(DeviceName),
    Eir(Vec<u8, EIR_DATA_LEN>),
}

impl DeviceProperty {
    /// Decode a raw `(kind, bytes)` pair as the vendor stack delivers it.
    ///
    /// COD must be 4 bytes (native little-endian) and RSSI 1 byte. Names
    /// are truncated, EIR blobs are clamped to [`EIR_DATA_LEN`]. An empty
    /// name is reported as `MalformedInput`.
    pub fn decode(kind: PropertyKind, bytes: &[u8]) -> Result<Self, Error> {
        match kind {
            PropertyKind::ClassOfDevice => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| Error::MalformedInput)?;
                Ok(Self::ClassOfDevice(ClassOfDevice(u32::from_le_bytes(raw))))
            }
            PropertyKind::Rssi => match bytes {
                [b] => Ok(Self::Rssi(*b as i8)),
                _ => Err(Error::MalformedInput),
            },
            PropertyKind::Name => DeviceName::from_bytes(bytes)
                .map(Self::Name)
                .ok_or(Error::MalformedInput),
            PropertyKind::Eir => {
                let len = bytes.len().min(EIR_DATA_LEN);
                Vec::from_slice(&bytes[..len])
                    .map(Self::Eir)
                    .map_err(|_| Error::MalformedInput)
            }
        }
    }
}

/// A service identifier as reported by the stack: `len` is 2, 4 or 16 and
/// the first `len` bytes of `value` hold it (little-endian for 2/4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteUuid {
    pub len: u8,
    pub value: [u8; 16],
}

impl RemoteUuid {
    pub fn uuid16(uuid: u16) -> Self {
        let mut value = [0u8; 16];
        value[..2].copy_from_slice(&uuid.to_le_bytes());
        Self { len: 2, value }
    }

    pub fn uuid32(uuid: u32) -> Self {
        let mut value = [0u8; 16];
        value[..4].copy_from_slice(&uuid.to_le_bytes());
        Self { len: 4, value }
    }

    pub fn uuid128(value: [u8; 16]) -> Self {
        Self { len: 16, value }
    }

    /// The significant bytes, or `None` when `len` exceeds the buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.value.get(..usize::from(self.len))
    }
}

/// Inquiry state notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    Started,
    Stopped,
}

/// Events delivered by the radio stack, one at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent {
    DeviceFound {
        address: BdAddr,
        properties: Vec<DeviceProperty, MAX_DEVICE_PROPERTIES>,
    },
    DiscoveryStateChanged(DiscoveryState),
    RemoteServices {
        address: BdAddr,
        success: bool,
        uuids: Vec<RemoteUuid, MAX_SERVICE_UUIDS>,
    },
}

/// Inquiry access mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InquiryMode {
    General,
    Limited,
}

/// Parameters for a single inquiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InquiryParams {
    pub mode: InquiryMode,
    /// 1.28 s units.
    pub duration: u8,
    /// 0 = unlimited.
    pub num_responses: u8,
}

/// Requests issued to the lower layer. All are fire-and-forget: results
/// come back later as [`StackEvent`]s.
pub trait RadioStack {
    fn begin_inquiry(&self, params: InquiryParams) -> Result<(), RadioError>;

    fn cancel_inquiry(&self) -> Result<(), RadioError>;

    fn request_remote_services(&self, address: BdAddr) -> Result<(), RadioError>;
}

impl<T: RadioStack + ?Sized> RadioStack for &T {
    fn begin_inquiry(&self, params: InquiryParams) -> Result<(), RadioError> {
        (**self).begin_inquiry(params)
    }

    fn cancel_inquiry(&self) -> Result<(), RadioError> {
        (**self).cancel_inquiry()
    }

    fn request_remote_services(&self, address: BdAddr) -> Result<(), RadioError> {
        (**self).request_remote_services(address)
    }
}
