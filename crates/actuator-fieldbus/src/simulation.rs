//! Actuator physics for simulated slaves.
//!
//! Each [`VirtualSlave`] owns a register bank and a kinematic state. The
//! [`SimulationEngine`] advances every slave of a network once per tick and
//! republishes the status block, so a poller reading the bank sees the
//! actuator travel, hit its end-stops and report torque.

use crate::transport::simulated::{RegisterBank, SharedNetwork, SimulatedNetwork};
use actuator_common::address::SlaveAddress;
use actuator_common::config::SimulationConfig;
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::codec::{decode, encode};
use actuator_protocol::product::Product;
use actuator_protocol::register_map::{
    CommandKind, COIL_SETUP, CONFIG_LEN, CONFIG_START, FIRMWARE_REVISION, PRODUCT_ID, STATUS_WORD,
};
use actuator_protocol::status::{ActuatorStatus, Alarms, Direction, StatusDecoder};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Firmware revision reported by simulated devices (1.2).
pub const SIMULATED_FIRMWARE: u16 = 0x0102;

/// Torque band while travelling, percent of rated.
pub const MOVING_TORQUE: (f32, f32) = (40.0, 60.0);

/// Torque band while idle, percent of rated.
pub const IDLE_TORQUE: (f32, f32) = (20.0, 30.0);

/// Motion state of a virtual actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    /// Not travelling.
    #[default]
    Idle,
    /// Travelling toward an end-stop.
    Moving(Direction),
}

/// Kinematic state of one virtual actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDeviceState {
    /// Owning slave.
    pub address: SlaveAddress,
    /// Position, percent open.
    pub position: f32,
    /// Torque, percent of rated.
    pub torque: f32,
    /// Current motion.
    pub motion: MotionState,
    /// Command being executed, cleared when motion ends.
    pub pending: Option<CommandKind>,
    /// End-stop the actuator is travelling to.
    pub target: f32,
    /// Soft setup mode.
    pub setup_mode: bool,
    /// Raised alarms.
    pub alarms: Alarms,
}

impl VirtualDeviceState {
    /// Fully closed and idle.
    #[must_use]
    pub fn new(address: SlaveAddress) -> Self {
        Self {
            address,
            position: 0.0,
            torque: 0.0,
            motion: MotionState::Idle,
            pending: None,
            target: 0.0,
            setup_mode: false,
            alarms: Alarms::default(),
        }
    }

    /// Check if travelling.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self.motion, MotionState::Moving(_))
    }

    /// Accept a motion command.
    ///
    /// Open or close from the matching end-stop is a no-op.
    pub fn apply_command(&mut self, command: CommandKind) {
        match command {
            CommandKind::Open if self.position < 100.0 => {
                self.motion = MotionState::Moving(Direction::Opening);
                self.target = 100.0;
                self.pending = Some(command);
            }
            CommandKind::Close if self.position > 0.0 => {
                self.motion = MotionState::Moving(Direction::Closing);
                self.target = 0.0;
                self.pending = Some(command);
            }
            CommandKind::Open | CommandKind::Close => {}
            CommandKind::Stop => self.halt(),
        }
    }

    fn halt(&mut self) {
        self.motion = MotionState::Idle;
        self.pending = None;
        self.target = self.position;
    }

    /// Advance one tick.
    ///
    /// `speed` and `torque_limit` are percentages read from the slave's
    /// configuration; a speed of zero moves at the minimum rate of 1 %.
    pub fn step<R: Rng>(&mut self, speed: u8, torque_limit: u8, step_size: f32, rng: &mut R) {
        let limit = f32::from(torque_limit.min(100));
        match self.motion {
            MotionState::Moving(direction) => {
                let demand = rng.gen_range(MOVING_TORQUE.0..=MOVING_TORQUE.1);
                let delta = f32::from(speed.clamp(1, 100)) / 100.0 * step_size;
                self.position = match direction {
                    Direction::Opening => (self.position + delta).min(self.target),
                    Direction::Closing => (self.position - delta).max(self.target),
                };
                self.torque = demand.min(limit);
                if (self.position - self.target).abs() < f32::EPSILON {
                    self.position = self.target;
                    self.halt();
                }
            }
            MotionState::Idle => {
                self.torque = rng.gen_range(IDLE_TORQUE.0..=IDLE_TORQUE.1).min(limit);
            }
        }
    }

    /// Snapshot as the device would report it.
    #[must_use]
    pub fn status(&self) -> ActuatorStatus {
        let direction = match self.motion {
            MotionState::Moving(direction) => Some(direction),
            MotionState::Idle => None,
        };
        let moving = direction.is_some();
        ActuatorStatus {
            position: self.position,
            torque: self.torque,
            power_ok: true,
            communication_ok: true,
            calibrated: true,
            moving,
            direction,
            open_limit: !moving && self.position >= 100.0,
            close_limit: !moving && self.position <= 0.0,
            setup_mode: self.setup_mode,
            alarms: self.alarms,
        }
    }
}

/// Simulated slave: register bank plus kinematic state.
#[derive(Debug, Clone)]
pub struct VirtualSlave {
    product: Product,
    bank: RegisterBank,
    state: VirtualDeviceState,
    encoder: StatusDecoder,
}

impl VirtualSlave {
    /// Slave with the product's factory configuration, closed and idle.
    #[must_use]
    pub fn new(address: SlaveAddress, product: Product) -> Self {
        let mut bank = RegisterBank::default();
        bank.load(CONFIG_START, &encode(&product.default_configuration()));
        bank.registers[usize::from(PRODUCT_ID)] = product.id;
        bank.registers[usize::from(FIRMWARE_REVISION)] = SIMULATED_FIRMWARE;
        let mut slave = Self {
            product,
            bank,
            state: VirtualDeviceState::new(address),
            encoder: StatusDecoder::new(product.raw_scale),
        };
        slave.publish();
        slave
    }

    /// Product served by this slave.
    #[must_use]
    pub fn product(&self) -> Product {
        self.product
    }

    /// Register bank.
    #[must_use]
    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    /// Kinematic state.
    #[must_use]
    pub fn state(&self) -> &VirtualDeviceState {
        &self.state
    }

    /// Store a configuration register.
    pub fn write_register(&mut self, address: u16, value: u16) -> ActuatorResult<()> {
        self.bank.write(address, value)
    }

    /// Apply a coil write.
    ///
    /// Command coils act on a rising write of `true`; the setup coil follows
    /// the written value. The status block is republished immediately.
    pub fn write_coil(&mut self, address: u16, value: bool) {
        if let Some(slot) = self.bank.coils.get_mut(usize::from(address)) {
            *slot = value;
        }
        if address == COIL_SETUP {
            self.state.setup_mode = value;
        } else if let Some(command) = CommandKind::from_coil(address).filter(|_| value) {
            debug!(slave = %self.state.address, %command, "Simulated command");
            self.state.apply_command(command);
        }
        self.publish();
    }

    /// Raise or clear alarms.
    pub fn set_alarms(&mut self, alarms: Alarms) {
        self.state.alarms = alarms;
        self.publish();
    }

    /// Advance one tick using the speed and torque limit currently
    /// configured in the bank.
    pub fn advance<R: Rng>(&mut self, step_size: f32, rng: &mut R) {
        let config = decode(&self.bank.registers[..usize::from(CONFIG_LEN)]);
        self.state
            .step(config.speed_setting, config.torque_limit, step_size, rng);
        self.publish();
    }

    fn publish(&mut self) {
        let block = self.encoder.encode(&self.state.status());
        self.bank.load(STATUS_WORD, &block);
    }
}

/// Ticks every slave of a simulated network.
#[derive(Debug)]
pub struct SimulationEngine {
    network: SharedNetwork,
    step_size: f32,
    rng: ChaCha8Rng,
    ticks: u64,
}

impl SimulationEngine {
    /// Engine with a fixed seed, or an entropy seed when `None`.
    #[must_use]
    pub fn new(network: SharedNetwork, step_size: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            network,
            step_size,
            rng,
            ticks: 0,
        }
    }

    /// Engine configured from the simulation section.
    #[must_use]
    pub fn from_config(network: SharedNetwork, config: &SimulationConfig) -> Self {
        Self::new(network, config.step_size, config.seed)
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance every slave once.
    pub fn tick(&mut self) -> ActuatorResult<()> {
        let mut network = SimulatedNetwork::lock(&self.network)?;
        for slave in network.slaves_mut() {
            slave.advance(self.step_size, &mut self.rng);
        }
        self.ticks += 1;
        trace!(tick = self.ticks, slaves = network.len(), "Simulation tick");
        Ok(())
    }

    /// Run the engine on a background thread.
    pub fn spawn(self, period: Duration) -> ActuatorResult<SimulationHandle> {
        if period.is_zero() {
            return Err(ActuatorError::Validation(
                "simulation tick period must be non-zero".into(),
            ));
        }
        info!(period_ms = period.as_millis(), "Starting simulation engine");

        let state = Arc::new(EngineState {
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(self.ticks),
        });
        let thread_state = Arc::clone(&state);
        let mut engine = self;

        let handle = thread::Builder::new()
            .name("actuator-sim".into())
            .spawn(move || {
                debug!("Simulation thread started");
                while !thread_state.stop_requested.load(Ordering::Acquire) {
                    let deadline = Instant::now() + period;
                    sleep_until(deadline, &thread_state.stop_requested);
                    if thread_state.stop_requested.load(Ordering::Acquire) {
                        break;
                    }
                    if let Err(e) = engine.tick() {
                        warn!(error = %e, "Simulation tick failed, stopping");
                        break;
                    }
                    thread_state.ticks.store(engine.ticks, Ordering::Release);
                }
                thread_state.running.store(false, Ordering::Release);
                debug!("Simulation thread stopped");
                engine
            })
            .map_err(|e| {
                ActuatorError::Validation(format!("failed to spawn simulation thread: {e}"))
            })?;

        Ok(SimulationHandle {
            state,
            handle: Some(handle),
        })
    }
}

/// Park until `deadline` or until `stop` is raised and the thread unparked.
pub(crate) fn sleep_until(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}

#[derive(Debug)]
struct EngineState {
    stop_requested: AtomicBool,
    running: AtomicBool,
    ticks: AtomicU64,
}

/// Handle to a running [`SimulationEngine`].
#[derive(Debug)]
pub struct SimulationHandle {
    state: Arc<EngineState>,
    handle: Option<JoinHandle<SimulationEngine>>,
}

impl SimulationHandle {
    /// Check if the engine thread is ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::Acquire)
    }

    /// Stop the engine and return it. Returns `None` if already stopped.
    pub fn stop(&mut self) -> Option<SimulationEngine> {
        let handle = self.handle.take()?;
        info!("Stopping simulation engine");
        self.state.stop_requested.store(true, Ordering::Release);
        handle.thread().unpark();
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("Simulation thread panicked: {:?}", e);
                None
            }
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
