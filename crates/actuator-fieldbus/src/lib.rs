//! Bus layer for actuator communication.
//!
//! This crate provides:
//! - [`Transport`] trait with hardware and simulated backends
//! - [`device`] module with per-slave configuration, command and status operations
//! - [`poller`] module with the periodic status poller
//! - [`simulation`] module with the virtual actuator model and its engine
//! - [`session`] module owning the active mode and its teardown

pub mod device;
pub mod poller;
pub mod session;
pub mod simulation;
pub mod transport;

pub use device::{Device, Identity, SharedDevice};
pub use poller::{PollReport, Poller, PollerMonitor};
pub use session::{ModeRequest, Session};
pub use simulation::{SimulationEngine, SimulationHandle, VirtualDeviceState, VirtualSlave};
pub use transport::{
    HardwareTransport, LinkError, SerialLink, SharedNetwork, SharedTransport, SimulatedNetwork,
    SimulatedTransport, Transport, TransportKind,
};
