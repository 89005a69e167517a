//! Simulated network integration tests.
//!
//! These drive a `Session` in simulation mode through its public surface:
//! provisioning, commands, manual and background ticking, polling, and the
//! saved-document round trip.

use actuator_common::address::SlaveAddress;
use actuator_common::config::{PollingConfig, SimulatedSlaveConfig, SimulationConfig};
use actuator_common::error::ActuatorError;
use actuator_fieldbus::{ModeRequest, Session};
use actuator_protocol::codec::decode;
use actuator_protocol::document::ConfigurationDocument;
use actuator_protocol::register_map::CommandKind;
use actuator_protocol::status::{ActuatorState, Direction};
use std::time::{Duration, Instant};

fn addr(n: u8) -> SlaveAddress {
    SlaveAddress::new(n).unwrap()
}

fn session(slaves: &[(u8, u16)]) -> Session {
    let config = SimulationConfig {
        seed: Some(11),
        slaves: slaves
            .iter()
            .map(|&(a, product)| SimulatedSlaveConfig {
                address: addr(a),
                product,
                name: Some(format!("valve-{a}")),
            })
            .collect(),
        ..SimulationConfig::default()
    };
    Session::open(ModeRequest::Simulation(config), PollingConfig::default()).unwrap()
}

#[test]
fn test_open_then_close_cycle() {
    let mut session = session(&[(1, 1)]);
    let device = session.device(addr(1)).unwrap();

    device.lock().unwrap().issue_command(CommandKind::Open).unwrap();
    let mut last = 0.0;
    for _ in 0..100 {
        session.step_simulation(1).unwrap();
        let status = device.lock().unwrap().poll_status().unwrap();
        assert!(status.position > last);
        assert!(!(status.open_limit && status.close_limit));
        last = status.position;
    }
    let status = device.lock().unwrap().poll_status().unwrap();
    assert_eq!(status.state(), ActuatorState::Open);

    device.lock().unwrap().issue_command(CommandKind::Close).unwrap();
    let status = device.lock().unwrap().poll_status().unwrap();
    assert_eq!(status.direction, Some(Direction::Closing));
    session.step_simulation(100).unwrap();
    let status = device.lock().unwrap().poll_status().unwrap();
    assert_eq!(status.state(), ActuatorState::Closed);
}

#[test]
fn test_torque_never_exceeds_limit() {
    let mut session = session(&[(1, 1), (2, 2), (3, 3)]);
    let limits = [45u8, 60, 100];
    for (device, limit) in session.devices().iter().zip(limits) {
        let mut device = device.lock().unwrap();
        let mut config = device.read_configuration().unwrap();
        config.torque_limit = limit;
        config.speed_setting = 5;
        device.write_configuration(&config).unwrap();
        device.issue_command(CommandKind::Open).unwrap();
    }

    for _ in 0..300 {
        session.step_simulation(1).unwrap();
        for (device, limit) in session.devices().iter().zip(limits) {
            let status = device.lock().unwrap().poll_status().unwrap();
            assert!(status.torque >= 0.0);
            assert!(status.torque <= f32::from(limit) + 0.1);
        }
    }
}

#[test]
fn test_background_engine_with_poller() {
    let mut session = session(&[(1, 1)]);
    session.start_simulation().unwrap();
    let reports = session.start_polling_every(Duration::from_millis(100)).unwrap();

    session
        .device(addr(1))
        .unwrap()
        .lock()
        .unwrap()
        .issue_command(CommandKind::Open)
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut moved = false;
    while Instant::now() < deadline {
        let Ok(report) = reports.recv_timeout(Duration::from_secs(1)) else {
            continue;
        };
        assert_eq!(report.slave, addr(1));
        if report.result.unwrap().position > 0.0 {
            moved = true;
            break;
        }
    }
    assert!(moved, "polled position never advanced");

    session.stop_polling();
    session.stop_simulation();
    assert!(!session.simulation_running());
}

#[test]
fn test_provisioned_slave_not_found_elsewhere() {
    let session = session(&[(1, 1)]);
    assert!(matches!(
        session.device(addr(2)),
        Err(ActuatorError::NotFound { slave: 2 })
    ));
}

#[test]
fn test_document_round_trip() {
    let session = session(&[(1, 1), (5, 3)]);
    let document = session.export_document().unwrap();
    assert_eq!(document.devices[1].name, "valve-5");

    let json = document.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["devices"][0]["slave_address"], 1);
    assert_eq!(
        value["devices"][1]["configuration"]["control_mode"],
        "local"
    );

    let parsed = ConfigurationDocument::from_json(&json).unwrap();
    assert_eq!(parsed, document);

    let device = session.device(addr(5)).unwrap();
    let read = device.lock().unwrap().read_configuration().unwrap();
    assert_eq!(parsed.devices[1].configuration, read);
    assert_eq!(decode(&actuator_protocol::codec::encode(&read)), read);
}
