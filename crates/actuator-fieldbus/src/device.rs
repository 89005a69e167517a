//! Per-slave device operations.
//!
//! A [`Device`] turns protocol-level requests (read the configuration, open
//! the valve, poll the status) into register transactions on a shared
//! transport. It never retries; every transport error reaches the caller
//! unchanged and leaves the cached status untouched.

use crate::transport::{lock, SharedTransport};
use actuator_common::address::SlaveAddress;
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::codec::{decode, encode, validate_registers, DeviceConfiguration};
use actuator_protocol::document::DeviceRecord;
use actuator_protocol::product::Product;
use actuator_protocol::register_map::{
    CommandKind, CALIBRATION_START, COIL_SETUP, CONFIG_LEN, CONFIG_START, CONFIG_WRITE_LEN,
    PRODUCT_ID, STATUS_LEN, STATUS_START,
};
use actuator_protocol::status::{ActuatorStatus, StatusDecoder};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace, warn};

/// Device shared between the session and the poller.
pub type SharedDevice = Arc<Mutex<Device>>;

/// Product identity read from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Catalog entry (generic if unrecognised).
    pub product: Product,
    /// Firmware revision register.
    pub firmware: u16,
}

/// Handle to one slave on a transport.
pub struct Device {
    address: SlaveAddress,
    name: String,
    transport: SharedTransport,
    product: Option<Product>,
    torque_limit: u8,
    last_status: Option<ActuatorStatus>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("product", &self.product)
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a handle. No I/O is performed.
    pub fn new(address: SlaveAddress, transport: SharedTransport) -> Self {
        Self {
            address,
            name: format!("Actuator {address}"),
            transport,
            product: None,
            torque_limit: 100,
            last_status: None,
        }
    }

    /// Set the product without reading it from the device.
    #[must_use]
    pub fn with_product(mut self, product: Product) -> Self {
        self.product = Some(product);
        self
    }

    /// Set the operator-facing name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bus address.
    #[must_use]
    pub fn address(&self) -> SlaveAddress {
        self.address
    }

    /// Operator-facing name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Product, if known.
    #[must_use]
    pub fn product(&self) -> Option<Product> {
        self.product
    }

    /// Last successfully polled status.
    #[must_use]
    pub fn last_status(&self) -> Option<&ActuatorStatus> {
        self.last_status.as_ref()
    }

    fn decoder(&self) -> StatusDecoder {
        let scale = self.product.map(|p| p.raw_scale).unwrap_or_default();
        StatusDecoder::new(scale).with_torque_limit(self.torque_limit)
    }

    fn read(&self, start: u16, count: u16) -> ActuatorResult<Vec<u16>> {
        let mut transport = lock(&self.transport)?;
        let values = transport.read_registers(self.address, start, count)?;
        if values.len() != usize::from(count) {
            return Err(ActuatorError::Communication(format!(
                "slave {}: short read ({} of {count} registers)",
                self.address,
                values.len()
            )));
        }
        Ok(values)
    }

    fn write_block(&self, start: u16, values: &[u16]) -> ActuatorResult<()> {
        let mut transport = lock(&self.transport)?;
        for (address, &value) in (start..).zip(values) {
            transport.write_register(self.address, address, value)?;
        }
        Ok(())
    }

    /// Read product identifier and firmware revision and adopt the product's
    /// raw scale for status decoding.
    pub fn read_identity(&mut self) -> ActuatorResult<Identity> {
        let values = self.read(PRODUCT_ID, 2)?;
        let identity = Identity {
            product: Product::resolve(values[0]),
            firmware: values[1],
        };
        info!(
            slave = %self.address,
            product = %identity.product,
            firmware = identity.firmware,
            "Identified device"
        );
        self.product = Some(identity.product);
        Ok(identity)
    }

    /// Read and decode the full configuration block.
    ///
    /// The decoded torque limit also bounds subsequently polled torque.
    pub fn read_configuration(&mut self) -> ActuatorResult<DeviceConfiguration> {
        let registers = self.read(CONFIG_START, CONFIG_LEN)?;
        if let Err(e) = validate_registers(&registers) {
            warn!(slave = %self.address, error = %e, "Configuration block repaired on decode");
        }
        let config = decode(&registers);
        self.torque_limit = config.torque_limit;
        trace!(slave = %self.address, "Read configuration");
        Ok(config)
    }

    /// Write flags, scalars and network settings (registers `0..20`) in
    /// address order.
    ///
    /// Writes are not transactional: on failure, registers before the
    /// failing one have already been written.
    pub fn write_configuration(&mut self, config: &DeviceConfiguration) -> ActuatorResult<()> {
        config.validate()?;
        let block = encode(config);
        self.write_block(CONFIG_START, &block[..usize::from(CONFIG_WRITE_LEN)])?;
        self.torque_limit = config.torque_limit;
        debug!(slave = %self.address, "Wrote configuration");
        Ok(())
    }

    /// Write the calibration registers (`20..28`).
    pub fn write_calibration(&mut self, config: &DeviceConfiguration) -> ActuatorResult<()> {
        let block = encode(config);
        self.write_block(
            CALIBRATION_START,
            &block[usize::from(CALIBRATION_START)..usize::from(CONFIG_LEN)],
        )?;
        debug!(slave = %self.address, "Wrote calibration");
        Ok(())
    }

    /// Write a command coil.
    pub fn issue_command(&mut self, command: CommandKind) -> ActuatorResult<()> {
        lock(&self.transport)?.write_coil(self.address, command.coil(), true)?;
        info!(slave = %self.address, %command, "Command issued");
        Ok(())
    }

    /// Invert the last observed setup flag and poll immediately.
    ///
    /// The device acknowledges nothing; the returned status shows whether
    /// the change took effect.
    pub fn toggle_setup_mode(&mut self) -> ActuatorResult<ActuatorStatus> {
        let enable = !self.last_status.is_some_and(|s| s.setup_mode);
        lock(&self.transport)?.write_coil(self.address, COIL_SETUP, enable)?;
        debug!(slave = %self.address, enable, "Setup mode toggled");
        self.poll_status()
    }

    /// Read and decode the status block, replacing the cached status.
    pub fn poll_status(&mut self) -> ActuatorResult<ActuatorStatus> {
        let block = self.read(STATUS_START, STATUS_LEN)?;
        if self.product.is_none() {
            self.product = Some(Product::resolve(block[usize::from(PRODUCT_ID - STATUS_START)]));
        }
        let status = self.decoder().decode(block[0], block[1], block[2]);
        self.last_status = Some(status);
        trace!(slave = %self.address, position = status.position, "Polled status");
        Ok(status)
    }

    /// Read the configuration into a saved-document record.
    pub fn snapshot(&mut self) -> ActuatorResult<DeviceRecord> {
        let configuration = self.read_configuration()?;
        let product_id = match self.product {
            Some(product) => product.id,
            None => self.read_identity()?.product.id,
        };
        Ok(DeviceRecord {
            slave_address: self.address,
            product_id,
            name: self.name.clone(),
            configuration,
        })
    }
}
