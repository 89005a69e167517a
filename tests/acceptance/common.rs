//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Opening seeded simulation sessions
//! - A bench serial link that answers every unit it was given

#![allow(dead_code)]

use actuator_common::address::SlaveAddress;
use actuator_common::config::{PollingConfig, SerialConfig, SimulatedSlaveConfig, SimulationConfig};
use actuator_fieldbus::transport::{ExceptionCode, LinkError, SerialLink};
use actuator_fieldbus::{ModeRequest, Session, SharedDevice};
use actuator_protocol::register_map::{BANK_SIZE, PRODUCT_ID};
use std::collections::BTreeMap;

/// Shorthand for a known-good address.
pub fn addr(n: u8) -> SlaveAddress {
    SlaveAddress::new(n).expect("test address in range")
}

/// Simulation session with `(address, product)` slaves and a fixed seed.
pub fn simulation(slaves: &[(u8, u16)]) -> Session {
    let config = SimulationConfig {
        seed: Some(2024),
        slaves: slaves
            .iter()
            .map(|&(address, product)| SimulatedSlaveConfig {
                address: addr(address),
                product,
                name: None,
            })
            .collect(),
        ..SimulationConfig::default()
    };
    Session::open(ModeRequest::Simulation(config), PollingConfig::default())
        .expect("simulation session opens")
}

/// Device handle for `address`.
pub fn device(session: &Session, address: u8) -> SharedDevice {
    session.device(addr(address)).expect("device provisioned")
}

type OpenHook = Box<dyn FnMut() + Send>;

/// In-process serial link serving fixed register tables.
pub struct BenchLink {
    units: BTreeMap<u8, Vec<u16>>,
    open: bool,
    on_open: Option<OpenHook>,
}

impl BenchLink {
    /// Link answering for `units`, each reporting its product id.
    pub fn new(units: &[(u8, u16)]) -> Self {
        let units = units
            .iter()
            .map(|&(unit, product)| {
                let mut registers = vec![0; usize::from(BANK_SIZE)];
                registers[usize::from(PRODUCT_ID)] = product;
                (unit, registers)
            })
            .collect();
        Self {
            units,
            open: false,
            on_open: None,
        }
    }

    /// Run `hook` just before the port opens.
    pub fn on_open<F: FnMut() + Send + 'static>(mut self, hook: F) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    fn unit(&mut self, unit: u8) -> Result<&mut Vec<u16>, LinkError> {
        if !self.open {
            return Err(LinkError::Port("port closed".into()));
        }
        self.units
            .get_mut(&unit)
            .ok_or(LinkError::Timeout(std::time::Duration::from_millis(100)))
    }
}

impl SerialLink for BenchLink {
    fn open(&mut self, _settings: &SerialConfig) -> Result<(), LinkError> {
        if let Some(hook) = self.on_open.as_mut() {
            hook();
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn read_holding_registers(
        &mut self,
        unit: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, LinkError> {
        let registers = self.unit(unit)?;
        let start = usize::from(start);
        let end = start + usize::from(count);
        registers
            .get(start..end)
            .map(<[u16]>::to_vec)
            .ok_or(LinkError::Exception(ExceptionCode::IllegalDataAddress))
    }

    fn write_single_register(&mut self, unit: u8, address: u16, value: u16) -> Result<(), LinkError> {
        let slot = self
            .unit(unit)?
            .get_mut(usize::from(address))
            .ok_or(LinkError::Exception(ExceptionCode::IllegalDataAddress))?;
        *slot = value;
        Ok(())
    }

    fn write_single_coil(&mut self, unit: u8, _address: u16, _value: bool) -> Result<(), LinkError> {
        self.unit(unit).map(|_| ())
    }
}
