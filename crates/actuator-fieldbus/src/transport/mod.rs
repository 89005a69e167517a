//! Register-level transport abstraction.
//!
//! Provides:
//! - [`Transport`] trait shared by every backend
//! - [`hardware`] backend delegating to a serial link
//! - [`simulated`] backend serving in-memory register banks

pub mod hardware;
pub mod simulated;

pub use hardware::{ExceptionCode, HardwareTransport, LinkError, SerialLink};
pub use simulated::{RegisterBank, SharedNetwork, SimulatedNetwork, SimulatedTransport};

use actuator_common::address::SlaveAddress;
use actuator_common::error::{ActuatorError, ActuatorResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// Supported transport backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Serial link to real devices.
    Hardware,
    /// In-process simulated devices.
    Simulated,
}

/// Register-level access to a population of slaves.
///
/// Implementations do not retry; every failure is returned to the caller.
pub trait Transport: Send {
    /// Backend type.
    fn kind(&self) -> TransportKind;

    /// Open the underlying link.
    fn connect(&mut self) -> ActuatorResult<()>;

    /// Close the underlying link. Closing a closed link is a no-op.
    fn disconnect(&mut self) -> ActuatorResult<()>;

    /// Check if the link is open.
    fn is_connected(&self) -> bool;

    /// Read `count` consecutive holding registers starting at `start`.
    fn read_registers(
        &mut self,
        slave: SlaveAddress,
        start: u16,
        count: u16,
    ) -> ActuatorResult<Vec<u16>>;

    /// Write one holding register.
    fn write_register(&mut self, slave: SlaveAddress, address: u16, value: u16)
        -> ActuatorResult<()>;

    /// Write one coil.
    fn write_coil(&mut self, slave: SlaveAddress, address: u16, value: bool)
        -> ActuatorResult<()>;

    /// Declare that a slave will be addressed.
    ///
    /// Hardware transports start accepting the address; simulated transports
    /// only confirm that the slave has been provisioned.
    fn attach_slave(&mut self, slave: SlaveAddress) -> ActuatorResult<()>;

    /// Known slave addresses in ascending order.
    fn list_slaves(&self) -> Vec<SlaveAddress>;
}

/// Transport shared between the session, its devices, and the poller.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Wrap a transport for sharing.
pub fn shared<T: Transport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}

/// Lock a shared transport, reporting a poisoned lock as a link failure.
pub fn lock(transport: &SharedTransport) -> ActuatorResult<MutexGuard<'_, Box<dyn Transport>>> {
    transport
        .lock()
        .map_err(|_| ActuatorError::Communication("transport lock poisoned".into()))
}

/// Reject zero-length and overflowing register ranges.
pub(crate) fn check_span(start: u16, count: u16, limit: u16) -> ActuatorResult<()> {
    if count == 0 {
        return Err(ActuatorError::Validation(
            "cannot read zero registers".into(),
        ));
    }
    let end = u32::from(start) + u32::from(count);
    if end > u32::from(limit) {
        return Err(ActuatorError::out_of_range(
            "register address",
            end - 1,
            0,
            u32::from(limit) - 1,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_span() {
        check_span(0, 80, 80).unwrap();
        check_span(64, 5, 80).unwrap();
        assert!(matches!(
            check_span(0, 0, 80),
            Err(ActuatorError::Validation(_))
        ));
        assert!(matches!(
            check_span(76, 5, 80),
            Err(ActuatorError::OutOfRange { value: 80, max: 79, .. })
        ));
        assert!(check_span(u16::MAX, 2, 80).is_err());
    }
}
