//! Session failure handling and mode switching acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A request to an unprovisioned slave fails with `NotFound` and leaves
//!   the device's cached status untouched
//! - Switching to hardware tears the simulation down completely before
//!   the serial port opens
//! - A closed session refuses further traffic

use super::common::{addr, device, simulation, BenchLink};
use actuator_common::config::{SerialConfig, SessionMode};
use actuator_common::error::ActuatorError;
use actuator_fieldbus::{Device, ModeRequest, SimulatedNetwork};
use actuator_protocol::register_map::CommandKind;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn test_unknown_slave_keeps_cached_status() {
    let mut session = simulation(&[(1, 1)]);
    let handle = device(&session, 1);

    handle.lock().unwrap().issue_command(CommandKind::Open).unwrap();
    session.step_simulation(5).unwrap();
    let before = handle.lock().unwrap().poll_status().unwrap();

    let network = session.simulated_network().unwrap();
    SimulatedNetwork::lock(&network)
        .unwrap()
        .remove_slave(addr(1))
        .unwrap();

    let mut device = handle.lock().unwrap();
    assert_eq!(
        device.read_configuration(),
        Err(ActuatorError::NotFound { slave: 1 })
    );
    assert_eq!(
        device.poll_status(),
        Err(ActuatorError::NotFound { slave: 1 })
    );
    assert_eq!(device.last_status(), Some(&before));
}

#[test]
fn test_never_provisioned_slave() {
    let session = simulation(&[(1, 1)]);
    assert!(matches!(
        session.device(addr(9)),
        Err(ActuatorError::NotFound { slave: 9 })
    ));

    let mut stray = Device::new(addr(9), session.transport());
    assert_eq!(
        stray.read_configuration(),
        Err(ActuatorError::NotFound { slave: 9 })
    );
    assert!(stray.last_status().is_none());
}

#[test]
fn test_switch_to_hardware_tears_down_first() {
    let mut session = simulation(&[(1, 1), (2, 2), (3, 3)]);
    session.start_simulation().unwrap();
    let reports = session.start_polling_every(Duration::from_millis(100)).unwrap();
    reports.recv_timeout(Duration::from_secs(5)).unwrap();

    let network = session.simulated_network().unwrap();
    let monitor = session.poller_monitor().unwrap();
    assert!(monitor.is_running());

    let seen = Arc::new(Mutex::new(None));
    let link = {
        let seen = Arc::clone(&seen);
        BenchLink::new(&[(7, 3)]).on_open(move || {
            let remaining = SimulatedNetwork::lock(&network).unwrap().len();
            *seen.lock().unwrap() = Some((remaining, monitor.is_running()));
        })
    };

    session
        .switch_mode(ModeRequest::Hardware {
            settings: SerialConfig::default(),
            link: Box::new(link),
            slaves: Vec::new(),
        })
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), Some((0, false)));
    assert_eq!(session.mode(), SessionMode::Hardware);
    assert_eq!(session.addresses(), vec![addr(7)]);
    assert!(session.simulated_network().is_none());

    let identity = device(&session, 7).lock().unwrap().read_identity().unwrap();
    assert_eq!(identity.product.id, 3);
}

#[test]
fn test_closed_session_refuses_traffic() {
    let mut session = simulation(&[(1, 1)]);
    let handle = device(&session, 1);
    session.close();

    assert!(!session.is_connected());
    assert!(session.addresses().is_empty());
    assert_eq!(
        handle.lock().unwrap().poll_status(),
        Err(ActuatorError::NotConnected)
    );
}
