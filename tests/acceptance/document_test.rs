//! Register packing and configuration document acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Function register flags land on exactly their documented bits
//! - A document exported from one session restores the same settings on
//!   a fresh one

use super::common::{addr, device, simulation};
use actuator_protocol::codec::{decode, encode, FunctionFlags};
use actuator_protocol::document::ConfigurationDocument;
use actuator_protocol::flags::{Actuation, InputMode};
use actuator_protocol::product::Product;
use actuator_protocol::register_map::FUNCTION_REGISTER;

#[test]
fn test_spring_return_momentary_local_packs_bits_zero_and_one() {
    let mut config = Product::lookup(1).unwrap().default_configuration();
    config.function = FunctionFlags {
        actuation: Actuation::SpringReturn,
        local_input_mode: InputMode::Momentary,
        ..FunctionFlags::default()
    };

    let block = encode(&config);
    assert_eq!(block[usize::from(FUNCTION_REGISTER)], 0b11);
    assert_eq!(decode(&block).function, config.function);
}

#[test]
fn test_document_restores_settings_on_new_session() {
    let source = simulation(&[(1, 1), (6, 3)]);
    {
        let handle = device(&source, 6);
        let mut device = handle.lock().unwrap();
        let mut config = device.read_configuration().unwrap();
        config.torque_limit = 65;
        config.speed_setting = 30;
        config.function.actuation = Actuation::SpringReturn;
        device.write_configuration(&config).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    source.export_document().unwrap().save(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["devices"][1]["slave_address"], 6);
    assert_eq!(raw["devices"][1]["configuration"]["torque_limit"], 65);

    let target = simulation(&[(1, 1), (6, 3)]);
    let document = ConfigurationDocument::load(&path).unwrap();
    target.apply_document(&document).unwrap();

    let restored = device(&target, 6).lock().unwrap().read_configuration().unwrap();
    let saved = &document.device(addr(6)).unwrap().configuration;
    assert_eq!(&restored, saved);
    assert_eq!(restored.torque_limit, 65);
    assert_eq!(restored.function.actuation, Actuation::SpringReturn);
}

#[test]
fn test_document_naming_missing_slave_is_rejected() {
    let source = simulation(&[(1, 1), (2, 1)]);
    let document = source.export_document().unwrap();

    let target = simulation(&[(1, 1)]);
    let err = target.apply_document(&document).unwrap_err();
    assert_eq!(
        err,
        actuator_common::error::ActuatorError::NotFound { slave: 2 }
    );
}
