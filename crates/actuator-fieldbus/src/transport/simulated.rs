//! Simulated transport serving virtual register banks.
//!
//! The [`SimulatedNetwork`] is shared between the transport, which applies
//! reads and writes, and the simulation engine, which rewrites each slave's
//! status block on every tick.

use super::{check_span, Transport, TransportKind};
use crate::simulation::VirtualSlave;
use actuator_common::address::SlaveAddress;
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::product::Product;
use actuator_protocol::register_map::{BANK_SIZE, COIL_COUNT, CONFIG_LEN};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, trace};

/// Storage for one slave's holding registers and coils.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    /// Holding registers, addresses `0..BANK_SIZE`.
    pub registers: [u16; BANK_SIZE as usize],
    /// Coils (last written value), addresses `0..COIL_COUNT`.
    pub coils: [bool; COIL_COUNT as usize],
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self {
            registers: [0u16; BANK_SIZE as usize],
            coils: [false; COIL_COUNT as usize],
        }
    }
}

impl RegisterBank {
    /// Copy out a register range.
    pub fn read(&self, start: u16, count: u16) -> ActuatorResult<Vec<u16>> {
        check_span(start, count, BANK_SIZE)?;
        let start = usize::from(start);
        Ok(self.registers[start..start + usize::from(count)].to_vec())
    }

    /// Store a value in the writable (configuration) region.
    ///
    /// Addresses past the bank are `OutOfRange`. Addresses inside the bank
    /// but outside the configuration block are read-only and give
    /// `Validation`.
    pub fn write(&mut self, address: u16, value: u16) -> ActuatorResult<()> {
        if address >= BANK_SIZE {
            return Err(ActuatorError::out_of_range(
                "register address",
                u32::from(address),
                0,
                u32::from(BANK_SIZE) - 1,
            ));
        }
        if address >= CONFIG_LEN {
            return Err(ActuatorError::Validation(format!(
                "register {address} is read-only"
            )));
        }
        self.registers[usize::from(address)] = value;
        Ok(())
    }

    /// Copy a block into the bank starting at `start`, ignoring access rules.
    pub fn load(&mut self, start: u16, values: &[u16]) {
        let start = usize::from(start);
        let end = (start + values.len()).min(self.registers.len());
        if start < end {
            self.registers[start..end].copy_from_slice(&values[..end - start]);
        }
    }
}

/// Address table of virtual slaves.
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    slaves: BTreeMap<SlaveAddress, VirtualSlave>,
}

/// Network shared between the transport and the simulation engine.
pub type SharedNetwork = Arc<Mutex<SimulatedNetwork>>;

impl SimulatedNetwork {
    /// Create an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty network ready for sharing.
    #[must_use]
    pub fn shared() -> SharedNetwork {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Lock a shared network.
    pub fn lock(network: &SharedNetwork) -> ActuatorResult<MutexGuard<'_, SimulatedNetwork>> {
        network
            .lock()
            .map_err(|_| ActuatorError::Communication("simulated network lock poisoned".into()))
    }

    /// Provision a slave with the factory configuration of `product_id`.
    pub fn add_slave(&mut self, address: SlaveAddress, product_id: u16) -> ActuatorResult<()> {
        let product = Product::lookup(product_id)?;
        if self.slaves.contains_key(&address) {
            return Err(ActuatorError::Validation(format!(
                "slave {address} already provisioned"
            )));
        }
        info!(slave = %address, product = %product, "Provisioned simulated slave");
        self.slaves.insert(address, VirtualSlave::new(address, product));
        Ok(())
    }

    /// Remove a slave.
    pub fn remove_slave(&mut self, address: SlaveAddress) -> ActuatorResult<VirtualSlave> {
        self.slaves
            .remove(&address)
            .ok_or(ActuatorError::NotFound {
                slave: address.get(),
            })
    }

    /// Remove every slave.
    pub fn clear(&mut self) {
        if !self.slaves.is_empty() {
            debug!(count = self.slaves.len(), "Clearing simulated network");
        }
        self.slaves.clear();
    }

    /// Number of provisioned slaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    /// Check if no slaves are provisioned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }

    /// Provisioned addresses in ascending order.
    #[must_use]
    pub fn addresses(&self) -> Vec<SlaveAddress> {
        self.slaves.keys().copied().collect()
    }

    /// Get a slave.
    pub fn slave(&self, address: SlaveAddress) -> ActuatorResult<&VirtualSlave> {
        self.slaves.get(&address).ok_or(ActuatorError::NotFound {
            slave: address.get(),
        })
    }

    /// Get a slave mutably.
    pub fn slave_mut(&mut self, address: SlaveAddress) -> ActuatorResult<&mut VirtualSlave> {
        self.slaves.get_mut(&address).ok_or(ActuatorError::NotFound {
            slave: address.get(),
        })
    }

    /// Iterate over all slaves mutably.
    pub fn slaves_mut(&mut self) -> impl Iterator<Item = &mut VirtualSlave> {
        self.slaves.values_mut()
    }
}

/// Transport backed by a [`SimulatedNetwork`].
#[derive(Debug)]
pub struct SimulatedTransport {
    network: SharedNetwork,
    connected: bool,
}

impl SimulatedTransport {
    /// Create a disconnected transport over `network`.
    #[must_use]
    pub fn new(network: SharedNetwork) -> Self {
        Self {
            network,
            connected: false,
        }
    }

    /// The served network.
    #[must_use]
    pub fn network(&self) -> &SharedNetwork {
        &self.network
    }

    fn ensure_connected(&self) -> ActuatorResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ActuatorError::NotConnected)
        }
    }
}

impl Transport for SimulatedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Simulated
    }

    fn connect(&mut self) -> ActuatorResult<()> {
        self.connected = true;
        info!("Simulated transport connected");
        Ok(())
    }

    fn disconnect(&mut self) -> ActuatorResult<()> {
        if self.connected {
            self.connected = false;
            info!("Simulated transport disconnected");
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
        self.ensure_connected()?;
        check_span(start, count, BANK_SIZE)?;
        let network = SimulatedNetwork::lock(&self.network)?;
        let values = network.slave(slave)?.bank().read(start, count)?;
        trace!(slave = %slave, start, count, "Simulated register read");
        Ok(values)
    }

    fn write_register(
        &mut self,
        slave: SlaveAddress,
        address: u16,
        value: u16,
    ) -> ActuatorResult<()> {
        self.ensure_connected()?;
        let mut network = SimulatedNetwork::lock(&self.network)?;
        network.slave_mut(slave)?.write_register(address, value)?;
        trace!(slave = %slave, address, value, "Simulated register write");
        Ok(())
    }

    fn write_coil(&mut self, slave: SlaveAddress, address: u16, value: bool) -> ActuatorResult<()> {
        self.ensure_connected()?;
        if address >= COIL_COUNT {
            return Err(ActuatorError::out_of_range(
                "coil address",
                u32::from(address),
                0,
                u32::from(COIL_COUNT) - 1,
            ));
        }
        let mut network = SimulatedNetwork::lock(&self.network)?;
        network.slave_mut(slave)?.write_coil(address, value);
        Ok(())
    }

    fn attach_slave(&mut self, slave: SlaveAddress) -> ActuatorResult<()> {
        SimulatedNetwork::lock(&self.network)?.slave(slave).map(|_| ())
    }

    fn list_slaves(&self) -> Vec<SlaveAddress> {
        SimulatedNetwork::lock(&self.network)
            .map(|network| network.addresses())
            .unwrap_or_default()
    }
}
