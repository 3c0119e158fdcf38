//! Two-phase discovery state machine.
//!
//! [`Dispatcher`] owns the registry and session and turns each
//! [`StackEvent`] into registry updates, phase changes and, at most, one
//! follow-up [`StackRequest`]. It never talks to the radio itself.
//!
//! [`Recon`] puts a `Dispatcher` behind a single blocking mutex and issues
//! the requests to a [`RadioStack`] once the lock is released, so the
//! stack may call straight back in from its own task.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use super::format::{format_uuid, UuidString};
use super::registry::{Commit, DeviceRegistry};
use super::{
    BdAddr, DeviceProperty, DiscoveredDevice, DiscoveryState, InquiryParams, RadioStack,
    RemoteUuid, StackEvent,
};
use crate::config::{ReconConfig, MAX_DISCOVERED_DEVICES, MAX_SERVICE_UUIDS};
use crate::error::Error;

/// Progress of the discovery protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryPhase {
    #[default]
    Idle,
    /// Inquiry requested, nothing recorded yet.
    Discovering,
    /// At least one device recorded.
    DiscoveryComplete,
    /// Waiting for the target's service list.
    ServiceDiscovering,
    ServiceDiscoveryComplete,
}

impl DiscoveryPhase {
    /// Inquiry or service discovery is outstanding.
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::Discovering | Self::ServiceDiscovering)
    }
}

/// Request the dispatcher wants issued to the radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackRequest {
    BeginInquiry(InquiryParams),
    CancelInquiry,
    RemoteServices(BdAddr),
}

/// Why an event was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IgnoreReason {
    /// Not expected in the current phase.
    PhaseMismatch(DiscoveryPhase),
    /// Service result for a device other than the target.
    AddressMismatch,
}

/// What handling one event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventOutcome {
    DeviceAdded { index: usize },
    DeviceUpdated { index: usize },
    /// Registry full; the device was not recorded.
    DeviceDropped,
    DiscoveryStarted,
    /// Inquiry ended without triggering service discovery.
    DiscoveryStopped,
    ServiceDiscoveryRequested(BdAddr),
    ServicesResolved(BdAddr),
    Ignored(IgnoreReason),
}

/// Final state of one service discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceStatus {
    /// Identifiers as text, in the order reported.
    Found(Vec<UuidString, MAX_SERVICE_UUIDS>),
    /// The stack reported failure.
    NotFound,
    /// The radio refused the request.
    RequestRejected,
    /// No result within the configured number of ticks.
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceReport {
    pub address: BdAddr,
    pub status: ServiceStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct DiscoverySession {
    phase: DiscoveryPhase,
    /// Device under service discovery; set on entry to `ServiceDiscovering`.
    target: Option<BdAddr>,
    /// Target chosen with `select_target`.
    pinned: Option<BdAddr>,
    /// Most recent device-found address this run.
    last_seen: Option<BdAddr>,
    inquiry_cancelled: bool,
    /// Ticks spent in `ServiceDiscovering`.
    pending_ticks: u32,
    report: Option<ServiceReport>,
}

impl DiscoverySession {
    fn restart(&mut self) {
        let pinned = self.pinned.take();
        *self = Self {
            phase: DiscoveryPhase::Discovering,
            pinned,
            ..Self::default()
        };
    }
}

/// Session state saved by [`Dispatcher::start_discovery`], handed back to
/// [`Dispatcher::abort_start`] if the radio refuses the inquiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot(DiscoverySession);

/// Registry plus session; all state mutation happens here.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    config: ReconConfig,
    registry: DeviceRegistry,
    session: DiscoverySession,
}

impl Dispatcher {
    pub fn new(config: ReconConfig) -> Self {
        Self {
            config,
            registry: DeviceRegistry::new(),
            session: DiscoverySession::default(),
        }
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.session.phase
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Address currently (or last) under service discovery.
    pub fn target(&self) -> Option<BdAddr> {
        self.session.target
    }

    pub fn pinned_target(&self) -> Option<BdAddr> {
        self.session.pinned
    }

    pub fn last_service_report(&self) -> Option<&ServiceReport> {
        self.session.report.as_ref()
    }

    /// Enter `Discovering` and return the inquiry to issue, together with
    /// the session it replaced.
    pub fn start_discovery(&mut self) -> Result<(InquiryParams, SessionSnapshot), Error> {
        let phase = self.session.phase;
        if phase.in_flight() {
            return Err(Error::Busy(phase));
        }
        info!("Starting device discovery (was {:?})", phase);
        let previous = SessionSnapshot(self.session.clone());
        self.session.restart();
        let params = InquiryParams {
            mode: self.config.inquiry_mode,
            duration: self.config.inquiry_duration,
            num_responses: self.config.inquiry_num_rsp,
        };
        Ok((params, previous))
    }

    /// Undo [`start_discovery`](Self::start_discovery) after the radio refused
    /// it. Only applies while the session is still `Discovering`; any later
    /// progress wins. A target pinned in the meantime is kept.
    ///
    /// Returns `true` if the previous session was restored.
    pub fn abort_start(&mut self, previous: SessionSnapshot) -> bool {
        if self.session.phase != DiscoveryPhase::Discovering {
            debug!("Not rolling back start in {:?}", self.session.phase);
            return false;
        }
        let pinned = self.session.pinned;
        self.session = previous.0;
        self.session.pinned = pinned;
        true
    }

    /// Mark inquiry as cancelled. Returns `None` when no inquiry is running.
    pub fn stop_discovery(&mut self) -> Option<StackRequest> {
        match self.session.phase {
            DiscoveryPhase::Discovering | DiscoveryPhase::DiscoveryComplete => {
                info!("Cancelling device discovery");
                self.session.inquiry_cancelled = true;
                Some(StackRequest::CancelInquiry)
            }
            phase => {
                debug!("No inquiry to cancel in {:?}", phase);
                None
            }
        }
    }

    /// Pin the device at `index` as the service-discovery target.
    pub fn select_target(&mut self, index: usize) -> Result<BdAddr, Error> {
        let address = self
            .registry
            .get(index)
            .map(|d| d.address)
            .ok_or(Error::NoSuchDevice(index))?;
        info!("Selected target {} ({})", index, address);
        self.session.pinned = Some(address);
        Ok(address)
    }

    /// Drop every device and return to `Idle`.
    pub fn clear_devices(&mut self) -> Result<(), Error> {
        let phase = self.session.phase;
        if phase.in_flight() {
            return Err(Error::Busy(phase));
        }
        self.registry.clear();
        self.session = DiscoverySession::default();
        Ok(())
    }

    /// Record that the radio refused the service request for `address`.
    pub fn abort_service_discovery(&mut self, address: BdAddr) {
        if self.session.phase == DiscoveryPhase::ServiceDiscovering
            && self.session.target == Some(address)
        {
            self.finish_services(address, ServiceStatus::RequestRejected);
        }
    }

    /// Advance the service-discovery deadline by one tick. Returns `true`
    /// when the pending request was abandoned on this tick.
    pub fn tick(&mut self) -> bool {
        let Some(limit) = self.config.service_timeout_ticks else {
            return false;
        };
        if self.session.phase != DiscoveryPhase::ServiceDiscovering {
            return false;
        }
        self.session.pending_ticks = self.session.pending_ticks.saturating_add(1);
        if self.session.pending_ticks < limit {
            return false;
        }
        let Some(address) = self.session.target else {
            return false;
        };
        warn!(
            "Service discovery for {} timed out after {} ticks",
            address, self.session.pending_ticks
        );
        self.finish_services(address, ServiceStatus::TimedOut);
        true
    }

    /// Handle one stack event to completion.
    pub fn dispatch(&mut self, event: StackEvent) -> (EventOutcome, Option<StackRequest>) {
        match event {
            StackEvent::DeviceFound {
                address,
                properties,
            } => (self.on_device_found(address, &properties), None),
            StackEvent::DiscoveryStateChanged(DiscoveryState::Started) => {
                (self.on_discovery_started(), None)
            }
            StackEvent::DiscoveryStateChanged(DiscoveryState::Stopped) => {
                self.on_discovery_stopped()
            }
            StackEvent::RemoteServices {
                address,
                success,
                uuids,
            } => (self.on_remote_services(address, success, &uuids), None),
        }
    }

    fn on_device_found(&mut self, address: BdAddr, properties: &[DeviceProperty]) -> EventOutcome {
        let candidate = DiscoveredDevice::from_properties(address, properties);

        let outcome = match self.registry.commit_discovery(candidate) {
            Ok(Commit::Inserted { index }) => {
                if let Some(device) = self.registry.get(index) {
                    info!("Found new device: {}", address);
                    info!(
                        "--Device Type: {}  Class: {}",
                        device.major_class().label(),
                        device.class_of_device.raw()
                    );
                    info!("--RSSI: {}", device.rssi);
                    if let Some(name) = &device.name {
                        info!("--Device Name: {}", name);
                    }
                }
                EventOutcome::DeviceAdded { index }
            }
            Ok(Commit::Updated {
                index,
                previous_rssi,
                name_backfilled,
            }) => {
                if let Some(device) = self.registry.get(index) {
                    debug!(
                        "Updating RSSI for {} from {} to {}",
                        address, previous_rssi, device.rssi
                    );
                    if name_backfilled {
                        info!("--Device Name: {}", device.display_name());
                    }
                }
                EventOutcome::DeviceUpdated { index }
            }
            Err(Error::ResourceExhausted) => {
                warn!(
                    "Device registry full ({} entries), dropping {}",
                    MAX_DISCOVERED_DEVICES, address
                );
                return EventOutcome::DeviceDropped;
            }
            Err(e) => {
                warn!("Dropping {}: {}", address, e);
                return EventOutcome::DeviceDropped;
            }
        };

        self.session.last_seen = Some(address);
        if !self.session.inquiry_cancelled
            && matches!(
                self.session.phase,
                DiscoveryPhase::Idle | DiscoveryPhase::Discovering
            )
        {
            self.session.phase = DiscoveryPhase::DiscoveryComplete;
        }
        outcome
    }

    fn on_discovery_started(&mut self) -> EventOutcome {
        info!("Discovery started");
        if self.session.phase == DiscoveryPhase::Idle {
            self.session.phase = DiscoveryPhase::Discovering;
        }
        EventOutcome::DiscoveryStarted
    }

    fn on_discovery_stopped(&mut self) -> (EventOutcome, Option<StackRequest>) {
        info!("Device discovery stopped.");
        let phase = self.session.phase;
        if !matches!(
            phase,
            DiscoveryPhase::Discovering | DiscoveryPhase::DiscoveryComplete
        ) {
            debug!("Ignoring discovery stop in {:?}", phase);
            return (
                EventOutcome::Ignored(IgnoreReason::PhaseMismatch(phase)),
                None,
            );
        }

        let Some(target) = self.resolve_target() else {
            self.session.phase = DiscoveryPhase::DiscoveryComplete;
            return (EventOutcome::DiscoveryStopped, None);
        };

        info!("Discover services on {}...", target);
        self.session.phase = DiscoveryPhase::ServiceDiscovering;
        self.session.target = Some(target);
        self.session.pending_ticks = 0;
        (
            EventOutcome::ServiceDiscoveryRequested(target),
            Some(StackRequest::RemoteServices(target)),
        )
    }

    /// Pinned device if still registered, else the latest sighting, else
    /// the newest registry entry.
    fn resolve_target(&self) -> Option<BdAddr> {
        self.session
            .pinned
            .filter(|a| self.registry.find(a).is_some())
            .or(self.session.last_seen)
            .or_else(|| self.registry.last().map(|d| d.address))
    }

    fn on_remote_services(
        &mut self,
        address: BdAddr,
        success: bool,
        uuids: &[RemoteUuid],
    ) -> EventOutcome {
        let phase = self.session.phase;
        if phase != DiscoveryPhase::ServiceDiscovering {
            debug!("Ignoring service result for {} in {:?}", address, phase);
            return EventOutcome::Ignored(IgnoreReason::PhaseMismatch(phase));
        }
        if self.session.target != Some(address) {
            debug!("Ignoring service result for non-target {}", address);
            return EventOutcome::Ignored(IgnoreReason::AddressMismatch);
        }

        let status = if success {
            info!("Services for device {} found", address);
            let mut found = Vec::new();
            for uuid in uuids {
                match uuid.as_bytes().ok_or(Error::MalformedInput).and_then(format_uuid) {
                    Ok(text) => {
                        debug!("-- UUID ({} bytes): {}", uuid.len, text.as_str());
                        // `uuids` has the same capacity as `found`.
                        let _ = found.push(text);
                    }
                    Err(_) => debug!("-- Skipping UUID with length {}", uuid.len),
                }
            }
            ServiceStatus::Found(found)
        } else {
            info!("Services for device {} not found", address);
            ServiceStatus::NotFound
        };

        self.finish_services(address, status);
        EventOutcome::ServicesResolved(address)
    }

    fn finish_services(&mut self, address: BdAddr, status: ServiceStatus) {
        self.session.phase = DiscoveryPhase::ServiceDiscoveryComplete;
        self.session.pending_ticks = 0;
        self.session.report = Some(ServiceReport { address, status });
    }
}

/// Shared reconnaissance state and the interface exposed to command code.
///
/// Every access goes through one mutex. `M` picks the raw mutex:
/// `CriticalSectionRawMutex` when events arrive from another task or
/// thread, `NoopRawMutex` when everything runs on one executor.
pub struct Recon<M: RawMutex, R: RadioStack> {
    state: Mutex<M, RefCell<Dispatcher>>,
    radio: R,
}

impl<M: RawMutex, R: RadioStack> Recon<M, R> {
    pub fn new(radio: R, config: ReconConfig) -> Self {
        Self {
            state: Mutex::new(RefCell::new(Dispatcher::new(config))),
            radio,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Run `f` with shared access to the dispatcher.
    pub fn with<T>(&self, f: impl FnOnce(&Dispatcher) -> T) -> T {
        self.state.lock(|cell| f(&cell.borrow()))
    }

    fn with_mut<T>(&self, f: impl FnOnce(&mut Dispatcher) -> T) -> T {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Process one stack event and issue any follow-up request.
    pub fn handle_event(&self, event: StackEvent) -> EventOutcome {
        let (outcome, request) = self.with_mut(|d| d.dispatch(event));
        if let Some(request) = request {
            // Failures are logged and folded into the session.
            let _ = self.issue(request);
        }
        outcome
    }

    /// Start a fresh inquiry.
    pub fn start_discovery(&self) -> Result<(), Error> {
        let (params, previous) = self.with_mut(Dispatcher::start_discovery)?;
        self.issue(StackRequest::BeginInquiry(params)).map_err(|e| {
            self.with_mut(|d| d.abort_start(previous));
            e
        })
    }

    /// Cancel a running inquiry. A no-op when none is running.
    pub fn stop_discovery(&self) -> Result<(), Error> {
        match self.with_mut(Dispatcher::stop_discovery) {
            Some(request) => self.issue(request),
            None => Ok(()),
        }
    }

    pub fn current_phase(&self) -> DiscoveryPhase {
        self.with(Dispatcher::phase)
    }

    /// Snapshot of every known device, in insertion order.
    pub fn list_known_devices(&self) -> Vec<DiscoveredDevice, MAX_DISCOVERED_DEVICES> {
        self.with(|d| d.registry().iter().cloned().collect())
    }

    pub fn device_by_index(&self, index: usize) -> Option<DiscoveredDevice> {
        self.with(|d| d.registry().get(index).cloned())
    }

    pub fn device_count(&self) -> usize {
        self.with(|d| d.registry().len())
    }

    pub fn select_target(&self, index: usize) -> Result<BdAddr, Error> {
        self.with_mut(|d| d.select_target(index))
    }

    pub fn clear_devices(&self) -> Result<(), Error> {
        self.with_mut(Dispatcher::clear_devices)
    }

    pub fn last_service_report(&self) -> Option<ServiceReport> {
        self.with(|d| d.last_service_report().cloned())
    }

    /// Call roughly once a second to enforce the service-discovery deadline.
    pub fn tick(&self) -> bool {
        self.with_mut(Dispatcher::tick)
    }

    fn issue(&self, request: StackRequest) -> Result<(), Error> {
        let result = match request {
            StackRequest::BeginInquiry(params) => self.radio.begin_inquiry(params),
            StackRequest::CancelInquiry => self.radio.cancel_inquiry(),
            StackRequest::RemoteServices(address) => self.radio.request_remote_services(address),
        };
        result.map_err(|e| {
            warn!("Radio rejected {:?}: {}", request, e);
            if let StackRequest::RemoteServices(address) = request {
                self.with_mut(|d| d.abort_service_discovery(address));
            }
            Error::Radio(e)
        })
    }
}
