//! Deduplicated store of discovered devices.
//!
//! One entry per address, in insertion order. Lookups are linear; an
//! inquiry window yields tens of devices, not thousands.

use heapless::Vec;

use super::{BdAddr, DiscoveredDevice};
use crate::config::MAX_DISCOVERED_DEVICES;
use crate::error::Error;

/// Result of [`DeviceRegistry::commit_discovery`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Commit {
    /// New address appended at `index`.
    Inserted { index: usize },
    /// Known address refreshed in place.
    Updated {
        index: usize,
        previous_rssi: i8,
        name_backfilled: bool,
    },
}

impl Commit {
    pub fn index(&self) -> usize {
        match *self {
            Commit::Inserted { index } | Commit::Updated { index, .. } => index,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DiscoveredDevice, MAX_DISCOVERED_DEVICES>,
}

impl DeviceRegistry {
    pub const fn new() -> Self {
        Self { devices: Vec::new() }
    }

    pub fn find(&self, address: &BdAddr) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.address == *address)
    }

    pub fn position(&self, address: &BdAddr) -> Option<usize> {
        self.devices.iter().position(|d| d.address == *address)
    }

    /// Append a device whose address is not yet registered.
    ///
    /// Fails with `AlreadyExists` for a known address and with
    /// `ResourceExhausted` when full; the registry is untouched either way.
    pub fn insert_new(&mut self, record: DiscoveredDevice) -> Result<usize, Error> {
        if self.find(&record.address).is_some() {
            warn!("Refusing duplicate device {}", record.address);
            return Err(Error::AlreadyExists);
        }
        let index = self.devices.len();
        self.devices
            .push(record)
            .map_err(|_| Error::ResourceExhausted)?;
        Ok(index)
    }

    /// Update the RSSI of a known device and return the previous value.
    /// Nothing else about the entry changes.
    pub fn refresh_signal_strength(&mut self, address: &BdAddr, rssi: i8) -> Result<i8, Error> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.address == *address)
            .ok_or(Error::NotFound)?;
        Ok(core::mem::replace(&mut device.rssi, rssi))
    }

    /// Insert `candidate` if its address is new, otherwise refresh the
    /// existing entry: RSSI is replaced when the candidate carries one, and
    /// the name is backfilled only when the entry has none.
    ///
    /// New entries without a direct name get it recovered from EIR here,
    /// once.
    pub fn commit_discovery(&mut self, mut candidate: DiscoveredDevice) -> Result<Commit, Error> {
        let Some(index) = self.position(&candidate.address) else {
            candidate.resolve_name();
            let index = self.insert_new(candidate)?;
            return Ok(Commit::Inserted { index });
        };

        let previous_rssi = if candidate.has_rssi() {
            self.refresh_signal_strength(&candidate.address, candidate.rssi)?
        } else {
            self.devices[index].rssi
        };

        let existing = &mut self.devices[index];
        let mut name_backfilled = false;
        if existing.name.is_none() {
            candidate.resolve_name();
            if let Some(name) = candidate.name.take() {
                existing.name = Some(name);
                name_backfilled = true;
            }
        }

        Ok(Commit::Updated {
            index,
            previous_rssi,
            name_backfilled,
        })
    }

    pub fn get(&self, index: usize) -> Option<&DiscoveredDevice> {
        self.devices.get(index)
    }

    pub fn last(&self) -> Option<&DiscoveredDevice> {
        self.devices.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredDevice> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.devices.is_full()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
