//! Integration tests for the reconnaissance flow through the public API.

use std::cell::RefCell;

use embassy_futures::block_on;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;

use btrecon::bt::pump::EventQueue;
use btrecon::{
    format_address, format_uuid, BdAddr, DeviceProperty, DiscoveryPhase, DiscoveryState, Error,
    EventOutcome, InquiryParams, MajorDeviceClass, PropertyKind, RadioError, RadioStack, Recon,
    ReconConfig, RemoteUuid, ServiceStatus, StackEvent, StackRequest,
};

#[derive(Default)]
struct RecordingRadio {
    requests: RefCell<std::vec::Vec<StackRequest>>,
}

impl RadioStack for RecordingRadio {
    fn begin_inquiry(&self, params: InquiryParams) -> Result<(), RadioError> {
        self.requests
            .borrow_mut()
            .push(StackRequest::BeginInquiry(params));
        Ok(())
    }

    fn cancel_inquiry(&self) -> Result<(), RadioError> {
        self.requests.borrow_mut().push(StackRequest::CancelInquiry);
        Ok(())
    }

    fn request_remote_services(&self, address: BdAddr) -> Result<(), RadioError> {
        self.requests
            .borrow_mut()
            .push(StackRequest::RemoteServices(address));
        Ok(())
    }
}

const SPEAKER: BdAddr = BdAddr::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

/// Device-found event built from raw property bytes, the way a stack
/// callback would hand them over.
fn raw_device_found(address: BdAddr, raw: &[(PropertyKind, &[u8])]) -> StackEvent {
    let mut properties = Vec::new();
    for (kind, bytes) in raw {
        if let Ok(property) = DeviceProperty::decode(*kind, bytes) {
            properties.push(property).unwrap();
        }
    }
    StackEvent::DeviceFound {
        address,
        properties,
    }
}

fn speaker_found(rssi: i8) -> StackEvent {
    let eir = [
        0x02, 0x01, 0x06, // flags
        0x08, 0x09, b'S', b'p', b'e', b'a', b'k', b'e', b'r',
    ];
    raw_device_found(
        SPEAKER,
        &[
            (PropertyKind::ClassOfDevice, &0x240414u32.to_le_bytes()),
            (PropertyKind::Rssi, &[rssi as u8]),
            (PropertyKind::Eir, &eir),
        ],
    )
}

#[test]
fn full_discovery_cycle() {
    let radio = RecordingRadio::default();
    let recon: Recon<CriticalSectionRawMutex, _> = Recon::new(&radio, ReconConfig::default());

    recon.start_discovery().unwrap();
    assert_eq!(
        recon.handle_event(StackEvent::DiscoveryStateChanged(DiscoveryState::Started)),
        EventOutcome::DiscoveryStarted
    );
    assert_eq!(
        recon.handle_event(speaker_found(-72)),
        EventOutcome::DeviceAdded { index: 0 }
    );
    recon.handle_event(speaker_found(-51));

    let devices = recon.list_known_devices();
    assert_eq!(devices.len(), 1);
    let speaker = &devices[0];
    assert_eq!(speaker.display_name(), "Speaker");
    assert_eq!(speaker.rssi, -51);
    assert_eq!(speaker.major_class(), MajorDeviceClass::AudioVideo);
    assert_eq!(
        format_address(&speaker.address.bytes()).unwrap().as_str(),
        "10:20:30:40:50:60"
    );

    recon.handle_event(StackEvent::DiscoveryStateChanged(DiscoveryState::Stopped));
    assert_eq!(recon.current_phase(), DiscoveryPhase::ServiceDiscovering);

    let uuids = Vec::from_slice(&[RemoteUuid::uuid16(0x110B), RemoteUuid::uuid16(0x110E)]).unwrap();
    recon.handle_event(StackEvent::RemoteServices {
        address: SPEAKER,
        success: true,
        uuids,
    });

    assert_eq!(recon.current_phase(), DiscoveryPhase::ServiceDiscoveryComplete);
    let report = recon.last_service_report().unwrap();
    assert_eq!(report.address, SPEAKER);
    match report.status {
        ServiceStatus::Found(list) => {
            assert_eq!(list.len(), 2);
            assert_eq!(list[0].as_str(), "110b");
            assert_eq!(list[1].as_str(), "110e");
        }
        other => panic!("unexpected status {other:?}"),
    }

    let requests = radio.requests.borrow();
    assert!(matches!(requests[0], StackRequest::BeginInquiry(_)));
    assert_eq!(requests[1], StackRequest::RemoteServices(SPEAKER));
    assert_eq!(requests.len(), 2);
}

#[test]
fn queue_drains_in_order() {
    let radio = RecordingRadio::default();
    let recon: Recon<CriticalSectionRawMutex, _> = Recon::new(&radio, ReconConfig::default());
    let queue: EventQueue<CriticalSectionRawMutex> = EventQueue::new();

    recon.start_discovery().unwrap();
    queue.post(speaker_found(-70)).unwrap();
    queue.post(speaker_found(-60)).unwrap();
    queue
        .post(StackEvent::DiscoveryStateChanged(DiscoveryState::Stopped))
        .unwrap();
    assert_eq!(queue.len(), 3);

    assert_eq!(queue.drain(&recon), 3);
    assert!(queue.is_empty());
    assert_eq!(recon.device_by_index(0).unwrap().rssi, -60);
    assert_eq!(recon.current_phase(), DiscoveryPhase::ServiceDiscovering);
}

#[test]
fn queue_overflow_reports_full() {
    let queue: EventQueue<CriticalSectionRawMutex, 2> = EventQueue::new();
    let stopped = StackEvent::DiscoveryStateChanged(DiscoveryState::Stopped);
    queue.post(stopped.clone()).unwrap();
    queue.post(stopped.clone()).unwrap();
    assert_eq!(queue.post(stopped), Err(Error::QueueFull));
    assert_eq!(queue.len(), 2);
}

#[test]
fn dispatcher_task_handles_posted_events() {
    let radio = RecordingRadio::default();
    let recon: Recon<CriticalSectionRawMutex, _> = Recon::new(&radio, ReconConfig::default());
    let queue: EventQueue<CriticalSectionRawMutex> = EventQueue::new();

    recon.start_discovery().unwrap();
    queue.post(speaker_found(-65)).unwrap();

    // The task handles what is queued, then parks until the next event.
    block_on(select(queue.run(&recon), async {}));

    assert!(queue.is_empty());
    assert_eq!(recon.device_count(), 1);
    assert_eq!(recon.current_phase(), DiscoveryPhase::DiscoveryComplete);
}

#[test]
fn unsupported_uuid_lengths_are_malformed() {
    assert_eq!(format_uuid(&[1, 2, 3]), Err(Error::MalformedInput));
    assert_eq!(format_uuid(&[0x0B, 0x11]).unwrap().as_str(), "110b");
}

#[test]
fn errors_display() {
    use std::string::ToString;

    assert_eq!(Error::NoSuchDevice(4).to_string(), "no device at index 4");
    assert!(!Error::Radio(RadioError::NotReady).to_string().is_empty());
}
