//! Motion and torque acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A continuous open command moves position strictly upward every tick
//!   until the open limit, then the actuator rests there
//! - Polled torque stays within its configured limit at all times
//! - Stop halts travel mid-stroke

use super::common::{device, simulation};
use actuator_protocol::register_map::CommandKind;
use actuator_protocol::status::ActuatorState;

#[test]
fn test_open_cycle_at_half_speed() {
    let mut session = simulation(&[(1, 1)]);
    let handle = device(&session, 1);
    {
        let mut device = handle.lock().unwrap();
        let config = device.read_configuration().unwrap();
        assert_eq!(config.speed_setting, 50);
        let start = device.poll_status().unwrap();
        assert!(start.position.abs() < f32::EPSILON);
        assert!(start.close_limit);
        device.issue_command(CommandKind::Open).unwrap();
    }

    let mut last = 0.0_f32;
    let mut ticks = 0;
    loop {
        session.step_simulation(1).unwrap();
        ticks += 1;
        let status = handle.lock().unwrap().poll_status().unwrap();
        assert!(
            status.position > last,
            "tick {ticks}: position {} did not increase from {last}",
            status.position
        );
        last = status.position;
        if !status.moving {
            assert!((status.position - 100.0).abs() < 1e-3);
            assert!(status.open_limit);
            assert!(!status.close_limit);
            assert_eq!(status.state(), ActuatorState::Open);
            break;
        }
        assert!(!status.open_limit);
        assert!(ticks < 500, "never reached the open limit");
    }

    // Half speed at the default step covers the stroke in 100 ticks.
    assert_eq!(ticks, 100);

    session.step_simulation(10).unwrap();
    let status = handle.lock().unwrap().poll_status().unwrap();
    assert!((status.position - 100.0).abs() < 1e-3);
    assert!(!status.moving);
}

#[test]
fn test_torque_within_limit_over_full_strokes() {
    let mut session = simulation(&[(1, 1), (2, 3)]);
    let limits = [(1, 55_u8), (2, 100_u8)];
    for &(address, limit) in &limits {
        let device = device(&session, address);
        let mut device = device.lock().unwrap();
        let mut config = device.read_configuration().unwrap();
        config.torque_limit = limit;
        config.speed_setting = 20;
        device.write_configuration(&config).unwrap();
        device.issue_command(CommandKind::Open).unwrap();
    }

    for tick in 0..600 {
        if tick == 300 {
            for &(address, _) in &limits {
                device(&session, address)
                    .lock()
                    .unwrap()
                    .issue_command(CommandKind::Close)
                    .unwrap();
            }
        }
        session.step_simulation(1).unwrap();
        for &(address, limit) in &limits {
            let status = device(&session, address).lock().unwrap().poll_status().unwrap();
            assert!(
                (0.0..=f32::from(limit) + 0.1).contains(&status.torque),
                "slave {address} torque {} above limit {limit}",
                status.torque
            );
            assert!((0.0..=100.0).contains(&status.position));
            assert!(!(status.open_limit && status.close_limit));
            assert!(!status.alarms.overtorque);
            // 0.4 % per tick covers a stroke in 250 of the 300 ticks.
            if tick == 299 {
                assert!(status.open_limit, "slave {address} stopped at {}", status.position);
            }
            if tick == 599 {
                assert!(status.close_limit, "slave {address} stopped at {}", status.position);
            }
        }
    }
}

#[test]
fn test_stop_halts_mid_stroke() {
    let mut session = simulation(&[(4, 2)]);
    let device = device(&session, 4);

    device.lock().unwrap().issue_command(CommandKind::Open).unwrap();
    session.step_simulation(10).unwrap();
    device.lock().unwrap().issue_command(CommandKind::Stop).unwrap();
    let stopped = device.lock().unwrap().poll_status().unwrap();

    session.step_simulation(10).unwrap();
    let later = device.lock().unwrap().poll_status().unwrap();
    assert!(!later.moving);
    assert!((later.position - stopped.position).abs() < 1e-3);
    assert!(later.position > 0.0 && later.position < 100.0);
    assert_eq!(later.state(), ActuatorState::Stopped);
}
