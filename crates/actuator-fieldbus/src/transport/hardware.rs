//! Hardware transport over a serial link.
//!
//! Byte-level RTU framing, CRC and port I/O belong to the [`SerialLink`]
//! implementation. This module maps link failures onto [`ActuatorError`] and
//! tracks which slaves may be addressed.

use super::{Transport, TransportKind};
use actuator_common::address::SlaveAddress;
use actuator_common::config::SerialConfig;
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::register_map::{BANK_SIZE, PRODUCT_ID};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Modbus exception codes returned by a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    /// Illegal function code.
    IllegalFunction = 0x01,
    /// Illegal data address.
    IllegalDataAddress = 0x02,
    /// Illegal data value.
    IllegalDataValue = 0x03,
    /// Slave device failure.
    DeviceFailure = 0x04,
    /// Slave device busy.
    DeviceBusy = 0x06,
}

impl ExceptionCode {
    /// Parse an exception code from a byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::IllegalFunction),
            0x02 => Some(Self::IllegalDataAddress),
            0x03 => Some(Self::IllegalDataValue),
            0x04 => Some(Self::DeviceFailure),
            0x06 => Some(Self::DeviceBusy),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "Illegal Function"),
            Self::IllegalDataAddress => write!(f, "Illegal Data Address"),
            Self::IllegalDataValue => write!(f, "Illegal Data Value"),
            Self::DeviceFailure => write!(f, "Slave Device Failure"),
            Self::DeviceBusy => write!(f, "Slave Device Busy"),
        }
    }
}

/// Failure reported by a serial link.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    /// Port could not be opened or has gone away.
    #[error("port unavailable: {0}")]
    Port(String),

    /// No response within the configured timeout.
    #[error("response timeout after {0:?}")]
    Timeout(Duration),

    /// Slave answered with an exception.
    #[error("slave exception: {0}")]
    Exception(ExceptionCode),

    /// Malformed or corrupted frame.
    #[error("frame error: {0}")]
    Frame(String),
}

/// Register-level primitives of a serial Modbus RTU link.
pub trait SerialLink: Send {
    /// Open the port with the given settings.
    fn open(&mut self, settings: &SerialConfig) -> Result<(), LinkError>;

    /// Close the port.
    fn close(&mut self);

    /// Function 0x03.
    fn read_holding_registers(
        &mut self,
        unit: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, LinkError>;

    /// Function 0x06.
    fn write_single_register(&mut self, unit: u8, address: u16, value: u16)
        -> Result<(), LinkError>;

    /// Function 0x05.
    fn write_single_coil(&mut self, unit: u8, address: u16, value: bool) -> Result<(), LinkError>;
}

/// Transport delegating to a [`SerialLink`].
pub struct HardwareTransport {
    settings: SerialConfig,
    link: Box<dyn SerialLink>,
    connected: bool,
    slaves: BTreeSet<SlaveAddress>,
}

impl std::fmt::Debug for HardwareTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareTransport")
            .field("port", &self.settings.port)
            .field("connected", &self.connected)
            .field("slaves", &self.slaves)
            .finish_non_exhaustive()
    }
}

impl HardwareTransport {
    /// Create a disconnected transport.
    pub fn new(settings: SerialConfig, link: Box<dyn SerialLink>) -> Self {
        Self {
            settings,
            link,
            connected: false,
            slaves: BTreeSet::new(),
        }
    }

    /// Serial settings.
    #[must_use]
    pub fn settings(&self) -> &SerialConfig {
        &self.settings
    }

    /// Forget a registered slave.
    pub fn remove_slave(&mut self, slave: SlaveAddress) -> bool {
        self.slaves.remove(&slave)
    }

    /// Query `candidates` by reading the product identifier register and
    /// register every slave that answers. Returns the responders.
    pub fn scan<I>(&mut self, candidates: I) -> ActuatorResult<Vec<SlaveAddress>>
    where
        I: IntoIterator<Item = SlaveAddress>,
    {
        self.ensure_connected()?;
        let mut found = Vec::new();
        for slave in candidates {
            match self.link.read_holding_registers(slave.get(), PRODUCT_ID, 1) {
                Ok(_) => {
                    debug!(slave = %slave, "Slave answered scan");
                    self.slaves.insert(slave);
                    found.push(slave);
                }
                Err(LinkError::Port(reason)) => {
                    return Err(ActuatorError::Communication(format!(
                        "scan aborted at slave {slave}: port unavailable: {reason}"
                    )));
                }
                Err(e) => trace!(slave = %slave, error = %e, "No answer to scan"),
            }
        }
        info!(found = found.len(), "Bus scan complete");
        Ok(found)
    }

    fn ensure_connected(&self) -> ActuatorResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ActuatorError::NotConnected)
        }
    }

    fn ensure_known(&self, slave: SlaveAddress) -> ActuatorResult<()> {
        self.ensure_connected()?;
        if self.slaves.contains(&slave) {
            Ok(())
        } else {
            Err(ActuatorError::NotFound { slave: slave.get() })
        }
    }

    fn map_error(slave: SlaveAddress, address: u16, error: LinkError) -> ActuatorError {
        match error {
            LinkError::Exception(ExceptionCode::IllegalDataAddress) => {
                ActuatorError::out_of_range(
                    "register address",
                    u32::from(address),
                    0,
                    u32::from(BANK_SIZE) - 1,
                )
            }
            other => {
                warn!(slave = %slave, address, error = %other, "Serial request failed");
                ActuatorError::Communication(format!("slave {slave}: {other}"))
            }
        }
    }
}

impl Transport for HardwareTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Hardware
    }

    fn connect(&mut self) -> ActuatorResult<()> {
        if self.connected {
            return Ok(());
        }
        info!(
            port = %self.settings.port,
            baud = self.settings.baud_rate,
            "Opening serial link"
        );
        self.link.open(&self.settings).map_err(|e| {
            ActuatorError::Communication(format!("failed to open {}: {e}", self.settings.port))
        })?;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> ActuatorResult<()> {
        if self.connected {
            self.link.close();
            self.connected = false;
            info!(port = %self.settings.port, "Serial link closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_registers(
        &mut self,
        slave: SlaveAddress,
        start: u16,
        count: u16,
    ) -> ActuatorResult<Vec<u16>> {
        self.ensure_known(slave)?;
        if count == 0 {
            return Err(ActuatorError::Validation("cannot read zero registers".into()));
        }
        let values = self
            .link
            .read_holding_registers(slave.get(), start, count)
            .map_err(|e| Self::map_error(slave, start, e))?;
        if values.len() != usize::from(count) {
            return Err(ActuatorError::Communication(format!(
                "slave {slave}: expected {count} registers, got {}",
                values.len()
            )));
        }
        trace!(slave = %slave, start, count, "Read holding registers");
        Ok(values)
    }

    fn write_register(
        &mut self,
        slave: SlaveAddress,
        address: u16,
        value: u16,
    ) -> ActuatorResult<()> {
        self.ensure_known(slave)?;
        self.link
            .write_single_register(slave.get(), address, value)
            .map_err(|e| Self::map_error(slave, address, e))?;
        debug!(slave = %slave, address, value, "Wrote holding register");
        Ok(())
    }

    fn write_coil(&mut self, slave: SlaveAddress, address: u16, value: bool) -> ActuatorResult<()> {
        self.ensure_known(slave)?;
        self.link
            .write_single_coil(slave.get(), address, value)
            .map_err(|e| Self::map_error(slave, address, e))?;
        debug!(slave = %slave, address, value, "Wrote coil");
        Ok(())
    }

    fn attach_slave(&mut self, slave: SlaveAddress) -> ActuatorResult<()> {
        if self.slaves.insert(slave) {
            debug!(slave = %slave, "Registered hardware slave");
        }
        Ok(())
    }

    fn list_slaves(&self) -> Vec<SlaveAddress> {
        self.slaves.iter().copied().collect()
    }
}
