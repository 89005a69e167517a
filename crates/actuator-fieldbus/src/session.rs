//! Connection session.
//!
//! A [`Session`] exclusively owns the active transport, the device list, the
//! poller and (in simulation mode) the simulated network and its engine.
//! Switching modes tears everything down in a fixed order before the new
//! transport is opened:
//!
//! 1. stop the poller
//! 2. stop the simulation engine
//! 3. clear the device list
//! 4. disconnect the transport
//! 5. clear the simulated network

use crate::device::{Device, SharedDevice};
use crate::poller::{Poller, PollerMonitor, PollReport};
use crate::simulation::{SimulationEngine, SimulationHandle};
use crate::transport::{
    lock, shared, HardwareTransport, SerialLink, SharedNetwork, SharedTransport,
    SimulatedNetwork, SimulatedTransport, Transport,
};
use actuator_common::address::SlaveAddress;
use actuator_common::config::{
    PollingConfig, SerialConfig, SessionConfig, SessionMode, SimulationConfig,
};
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::document::ConfigurationDocument;
use actuator_protocol::product::Product;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mode to establish.
pub enum ModeRequest {
    /// Simulated devices described by the simulation section.
    Simulation(SimulationConfig),
    /// Real devices on a serial link.
    Hardware {
        /// Port settings.
        settings: SerialConfig,
        /// Link driver.
        link: Box<dyn SerialLink>,
        /// Slaves to address; an empty list scans the whole bus.
        slaves: Vec<SlaveAddress>,
    },
}

impl ModeRequest {
    /// Mode this request establishes.
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        match self {
            Self::Simulation(_) => SessionMode::Simulation,
            Self::Hardware { .. } => SessionMode::Hardware,
        }
    }
}

impl std::fmt::Debug for ModeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation(config) => f.debug_tuple("Simulation").field(config).finish(),
            Self::Hardware {
                settings, slaves, ..
            } => f
                .debug_struct("Hardware")
                .field("settings", settings)
                .field("slaves", slaves)
                .finish_non_exhaustive(),
        }
    }
}

/// Simulation engine, either stepped by the caller or ticking on its thread.
#[derive(Debug)]
enum Engine {
    Manual(SimulationEngine),
    Running(SimulationHandle),
}

/// Everything a mode owns.
struct Established {
    mode: SessionMode,
    transport: SharedTransport,
    network: Option<SharedNetwork>,
    engine: Option<Engine>,
    tick: Duration,
    devices: BTreeMap<SlaveAddress, SharedDevice>,
}

/// Active connection with its devices.
pub struct Session {
    mode: SessionMode,
    polling: PollingConfig,
    transport: SharedTransport,
    network: Option<SharedNetwork>,
    engine: Option<Engine>,
    tick: Duration,
    devices: BTreeMap<SlaveAddress, SharedDevice>,
    poller: Option<Poller>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .field("polling", &self.poller.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session in the requested mode.
    pub fn open(request: ModeRequest, polling: PollingConfig) -> ActuatorResult<Self> {
        let established = establish(request)?;
        Ok(Self {
            mode: established.mode,
            polling,
            transport: established.transport,
            network: established.network,
            engine: established.engine,
            tick: established.tick,
            devices: established.devices,
            poller: None,
        })
    }

    /// Open a session from a loaded configuration.
    ///
    /// Hardware mode needs a link driver.
    pub fn from_config(
        config: &SessionConfig,
        link: Option<Box<dyn SerialLink>>,
    ) -> ActuatorResult<Self> {
        let request = match (config.mode, link) {
            (SessionMode::Simulation, _) => ModeRequest::Simulation(config.simulation.clone()),
            (SessionMode::Hardware, Some(link)) => ModeRequest::Hardware {
                settings: config.serial.clone(),
                link,
                slaves: Vec::new(),
            },
            (SessionMode::Hardware, None) => {
                return Err(ActuatorError::Validation(
                    "hardware mode requires a serial link driver".into(),
                ))
            }
        };
        Self::open(request, config.polling.clone())
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Check if the transport is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock(&self.transport).is_ok_and(|t| t.is_connected())
    }

    /// Shared transport.
    #[must_use]
    pub fn transport(&self) -> SharedTransport {
        Arc::clone(&self.transport)
    }

    /// Simulated network, in simulation mode.
    #[must_use]
    pub fn simulated_network(&self) -> Option<SharedNetwork> {
        self.network.clone()
    }

    /// Device addresses in ascending order.
    #[must_use]
    pub fn addresses(&self) -> Vec<SlaveAddress> {
        self.devices.keys().copied().collect()
    }

    /// Devices in address order.
    #[must_use]
    pub fn devices(&self) -> Vec<SharedDevice> {
        self.devices.values().cloned().collect()
    }

    /// Look up a device.
    pub fn device(&self, address: SlaveAddress) -> ActuatorResult<SharedDevice> {
        self.devices
            .get(&address)
            .cloned()
            .ok_or(ActuatorError::NotFound {
                slave: address.get(),
            })
    }

    /// Add a simulated slave and its device.
    pub fn provision(
        &mut self,
        address: SlaveAddress,
        product_id: u16,
        name: Option<String>,
    ) -> ActuatorResult<SharedDevice> {
        let network = self.network.as_ref().ok_or_else(|| {
            ActuatorError::Validation("slaves can only be provisioned in simulation mode".into())
        })?;
        SimulatedNetwork::lock(network)?.add_slave(address, product_id)?;
        let product = Product::lookup(product_id)?;
        let device = new_device(&self.transport, address, Some(product), name);
        self.devices.insert(address, Arc::clone(&device));
        Ok(device)
    }

    /// Attach a device for a slave the transport can reach.
    pub fn attach(&mut self, address: SlaveAddress) -> ActuatorResult<SharedDevice> {
        if let Some(device) = self.devices.get(&address) {
            return Ok(Arc::clone(device));
        }
        lock(&self.transport)?.attach_slave(address)?;
        let device = new_device(&self.transport, address, None, None);
        self.devices.insert(address, Arc::clone(&device));
        Ok(device)
    }

    /// Advance the simulation by `ticks` when it is stepped manually.
    pub fn step_simulation(&mut self, ticks: u32) -> ActuatorResult<()> {
        match self.engine.as_mut() {
            Some(Engine::Manual(engine)) => {
                for _ in 0..ticks {
                    engine.tick()?;
                }
                Ok(())
            }
            Some(Engine::Running(_)) => Err(ActuatorError::Validation(
                "simulation is running on its own clock".into(),
            )),
            None => Err(ActuatorError::Validation(
                "no simulation in hardware mode".into(),
            )),
        }
    }

    /// Run the simulation on its own thread at the configured tick.
    pub fn start_simulation(&mut self) -> ActuatorResult<()> {
        match self.engine.take() {
            Some(Engine::Manual(engine)) => {
                let handle = engine.spawn(self.tick)?;
                self.engine = Some(Engine::Running(handle));
                Ok(())
            }
            Some(running) => {
                self.engine = Some(running);
                Ok(())
            }
            None => Err(ActuatorError::Validation(
                "no simulation in hardware mode".into(),
            )),
        }
    }

    /// Return the simulation to manual stepping.
    pub fn stop_simulation(&mut self) {
        self.engine = match self.engine.take() {
            Some(Engine::Running(mut handle)) => handle.stop().map(Engine::Manual),
            other => other,
        };
    }

    /// Check if the simulation ticks on its own thread.
    #[must_use]
    pub fn simulation_running(&self) -> bool {
        matches!(&self.engine, Some(Engine::Running(h)) if h.is_running())
    }

    /// Start polling every device at the configured interval.
    pub fn start_polling(&mut self) -> ActuatorResult<Receiver<PollReport>> {
        self.start_polling_every(self.polling.interval)
    }

    /// Start polling every device at `interval`, replacing any running poller.
    pub fn start_polling_every(&mut self, interval: Duration) -> ActuatorResult<Receiver<PollReport>> {
        self.stop_polling();
        let (poller, rx) = Poller::start(self.devices(), interval)?;
        self.poller = Some(poller);
        Ok(rx)
    }

    /// Stop polling.
    pub fn stop_polling(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// State of the current poller.
    #[must_use]
    pub fn poller_monitor(&self) -> Option<PollerMonitor> {
        self.poller.as_ref().map(Poller::monitor)
    }

    /// Read every device's configuration into a saved document.
    pub fn export_document(&self) -> ActuatorResult<ConfigurationDocument> {
        let mut records = Vec::with_capacity(self.devices.len());
        for device in self.devices.values() {
            records.push(lock_device(device)?.snapshot()?);
        }
        Ok(ConfigurationDocument::new(records))
    }

    /// Write a saved document back to the devices it names.
    ///
    /// Stops at the first failure; earlier devices keep their new values.
    pub fn apply_document(&self, document: &ConfigurationDocument) -> ActuatorResult<()> {
        for record in &document.devices {
            let device = self.device(record.slave_address)?;
            let mut device = lock_device(&device)?;
            device.write_configuration(&record.configuration)?;
            device.write_calibration(&record.configuration)?;
        }
        info!(devices = document.devices.len(), "Applied configuration document");
        Ok(())
    }

    /// Tear down the current mode and establish another.
    ///
    /// If the new mode fails to open, the session stays torn down in its
    /// previous mode with no devices and a disconnected transport.
    pub fn switch_mode(&mut self, request: ModeRequest) -> ActuatorResult<()> {
        info!(from = %self.mode, to = %request.mode(), "Switching mode");
        self.teardown();
        let established = establish(request)?;
        self.mode = established.mode;
        self.transport = established.transport;
        self.network = established.network;
        self.engine = established.engine;
        self.tick = established.tick;
        self.devices = established.devices;
        Ok(())
    }

    /// Tear down and disconnect.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.stop_polling();
        if let Some(Engine::Running(mut handle)) = self.engine.take() {
            handle.stop();
        }
        self.devices.clear();
        match lock(&self.transport) {
            Ok(mut transport) => {
                if let Err(e) = transport.disconnect() {
                    warn!(error = %e, "Disconnect failed during teardown");
                }
            }
            Err(e) => warn!(error = %e, "Transport unavailable during teardown"),
        }
        if let Some(network) = self.network.take() {
            match SimulatedNetwork::lock(&network) {
                Ok(mut network) => network.clear(),
                Err(e) => warn!(error = %e, "Simulated network unavailable during teardown"),
            }
        }
        debug!(mode = %self.mode, "Session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock_device(device: &SharedDevice) -> ActuatorResult<std::sync::MutexGuard<'_, Device>> {
    device
        .lock()
        .map_err(|_| ActuatorError::Communication("device lock poisoned".into()))
}

fn new_device(
    transport: &SharedTransport,
    address: SlaveAddress,
    product: Option<Product>,
    name: Option<String>,
) -> SharedDevice {
    let mut device = Device::new(address, Arc::clone(transport));
    if let Some(product) = product {
        device = device.with_product(product);
    }
    if let Some(name) = name {
        device = device.with_name(name);
    }
    Arc::new(Mutex::new(device))
}

fn establish(request: ModeRequest) -> ActuatorResult<Established> {
    match request {
        ModeRequest::Simulation(config) => establish_simulation(&config),
        ModeRequest::Hardware {
            settings,
            link,
            slaves,
        } => establish_hardware(settings, link, &slaves),
    }
}

fn establish_simulation(config: &SimulationConfig) -> ActuatorResult<Established> {
    config.validate()?;
    let network = SimulatedNetwork::shared();
    {
        let mut net = SimulatedNetwork::lock(&network)?;
        for slave in &config.slaves {
            net.add_slave(slave.address, slave.product)?;
        }
    }

    let mut transport = SimulatedTransport::new(Arc::clone(&network));
    transport.connect()?;
    let transport = shared(transport);

    let mut devices = BTreeMap::new();
    for slave in &config.slaves {
        let product = Product::lookup(slave.product)?;
        devices.insert(
            slave.address,
            new_device(&transport, slave.address, Some(product), slave.name.clone()),
        );
    }
    info!(devices = devices.len(), "Simulation session established");

    Ok(Established {
        mode: SessionMode::Simulation,
        transport,
        engine: Some(Engine::Manual(SimulationEngine::from_config(
            Arc::clone(&network),
            config,
        ))),
        network: Some(network),
        tick: config.tick,
        devices,
    })
}

fn establish_hardware(
    settings: SerialConfig,
    link: Box<dyn SerialLink>,
    slaves: &[SlaveAddress],
) -> ActuatorResult<Established> {
    let mut transport = HardwareTransport::new(settings, link);
    transport.connect()?;
    if slaves.is_empty() {
        transport.scan(SlaveAddress::all())?;
    } else {
        for &slave in slaves {
            transport.attach_slave(slave)?;
        }
    }
    let addresses = transport.list_slaves();
    let transport = shared(transport);

    let devices = addresses
        .into_iter()
        .map(|address| (address, new_device(&transport, address, None, None)))
        .collect::<BTreeMap<_, _>>();
    info!(devices = devices.len(), "Hardware session established");

    Ok(Established {
        mode: SessionMode::Hardware,
        transport,
        network: None,
        engine: None,
        tick: Duration::ZERO,
        devices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LinkError;
    use actuator_common::config::SimulatedSlaveConfig;
    use actuator_protocol::register_map::CommandKind;
    use actuator_protocol::status::ActuatorState;

    fn addr(n: u8) -> SlaveAddress {
        SlaveAddress::new(n).unwrap()
    }

    fn simulation(slaves: &[(u8, u16)]) -> SimulationConfig {
        SimulationConfig {
            seed: Some(3),
            slaves: slaves
                .iter()
                .map(|&(a, p)| SimulatedSlaveConfig {
                    address: addr(a),
                    product: p,
                    name: None,
                })
                .collect(),
            ..SimulationConfig::default()
        }
    }

    struct NullLink;

    impl SerialLink for NullLink {
        fn open(&mut self, _settings: &SerialConfig) -> Result<(), LinkError> {
            Ok(())
        }
        fn close(&mut self) {}
        fn read_holding_registers(
            &mut self,
            _unit: u8,
            _start: u16,
            count: u16,
        ) -> Result<Vec<u16>, LinkError> {
            Ok(vec![0; usize::from(count)])
        }
        fn write_single_register(&mut self, _: u8, _: u16, _: u16) -> Result<(), LinkError> {
            Ok(())
        }
        fn write_single_coil(&mut self, _: u8, _: u16, _: bool) -> Result<(), LinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_open_simulation() {
        let session = Session::open(
            ModeRequest::Simulation(simulation(&[(4, 1), (2, 3)])),
            PollingConfig::default(),
        )
        .unwrap();
        assert_eq!(session.mode(), SessionMode::Simulation);
        assert!(session.is_connected());
        assert_eq!(session.addresses(), vec![addr(2), addr(4)]);
        assert!(session.device(addr(3)).is_err());
    }

    #[test]
    fn test_open_rejects_unusable_step_size() {
        for step_size in [0.0, f32::NAN] {
            let config = SimulationConfig {
                step_size,
                ..simulation(&[(1, 1)])
            };
            let err = Session::open(ModeRequest::Simulation(config), PollingConfig::default())
                .err()
                .unwrap();
            assert!(matches!(err, ActuatorError::Validation(msg) if msg.contains("step size")));
        }

        let zero_tick = SimulationConfig {
            tick: Duration::ZERO,
            ..simulation(&[(1, 1)])
        };
        assert!(matches!(
            Session::open(ModeRequest::Simulation(zero_tick), PollingConfig::default()),
            Err(ActuatorError::Validation(_))
        ));
    }

    #[test]
    fn test_provision_and_step() {
        let mut session = Session::open(
            ModeRequest::Simulation(simulation(&[])),
            PollingConfig::default(),
        )
        .unwrap();
        let device = session.provision(addr(9), 1, Some("inlet".into())).unwrap();
        device.lock().unwrap().issue_command(CommandKind::Open).unwrap();
        session.step_simulation(100).unwrap();
        let status = device.lock().unwrap().poll_status().unwrap();
        assert_eq!(status.state(), ActuatorState::Open);
        assert_eq!(device.lock().unwrap().name(), "inlet");
    }

    #[test]
    fn test_provision_rejected_in_hardware_mode() {
        let mut session = Session::open(
            ModeRequest::Hardware {
                settings: SerialConfig::default(),
                link: Box::new(NullLink),
                slaves: vec![addr(1)],
            },
            PollingConfig::default(),
        )
        .unwrap();
        assert_eq!(session.addresses(), vec![addr(1)]);
        assert!(matches!(
            session.provision(addr(2), 1, None),
            Err(ActuatorError::Validation(_))
        ));
        assert!(session.step_simulation(1).is_err());
    }

    #[test]
    fn test_switch_to_hardware_clears_simulation() {
        let mut session = Session::open(
            ModeRequest::Simulation(simulation(&[(1, 1), (2, 2)])),
            PollingConfig::default(),
        )
        .unwrap();
        let network = session.simulated_network().unwrap();
        let _rx = session.start_polling().unwrap();
        let monitor = session.poller_monitor().unwrap();

        session
            .switch_mode(ModeRequest::Hardware {
                settings: SerialConfig::default(),
                link: Box::new(NullLink),
                slaves: vec![addr(5)],
            })
            .unwrap();

        assert_eq!(session.mode(), SessionMode::Hardware);
        assert!(network.lock().unwrap().is_empty());
        assert!(!monitor.is_running());
        assert!(session.poller_monitor().is_none());
        assert!(session.simulated_network().is_none());
        assert_eq!(session.addresses(), vec![addr(5)]);
    }

    #[test]
    fn test_hardware_scan_finds_all() {
        let session = Session::open(
            ModeRequest::Hardware {
                settings: SerialConfig::default(),
                link: Box::new(NullLink),
                slaves: Vec::new(),
            },
            PollingConfig::default(),
        )
        .unwrap();
        assert_eq!(session.addresses().len(), 254);
    }

    #[test]
    fn test_background_simulation_toggles() {
        let mut session = Session::open(
            ModeRequest::Simulation(simulation(&[(1, 1)])),
            PollingConfig::default(),
        )
        .unwrap();
        session.start_simulation().unwrap();
        assert!(session.simulation_running());
        assert!(session.step_simulation(1).is_err());
        session.stop_simulation();
        assert!(!session.simulation_running());
        session.step_simulation(1).unwrap();
    }

    #[test]
    fn test_export_and_apply_document() {
        let mut session = Session::open(
            ModeRequest::Simulation(simulation(&[(1, 1), (3, 3)])),
            PollingConfig::default(),
        )
        .unwrap();
        let mut document = session.export_document().unwrap();
        assert_eq!(document.devices.len(), 2);
        assert_eq!(document.devices[1].product_id, 3);

        document.devices[0].configuration.torque_limit = 55;
        session.apply_document(&document).unwrap();
        let reread = session.export_document().unwrap();
        assert_eq!(reread.devices[0].configuration.torque_limit, 55);

        session.close();
        assert!(!session.is_connected());
        assert!(session.addresses().is_empty());
    }

    #[test]
    fn test_hardware_config_without_link() {
        let config = SessionConfig {
            mode: SessionMode::Hardware,
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::from_config(&config, None),
            Err(ActuatorError::Validation(_))
        ));
    }
}
