//! Periodic status polling.
//!
//! The poller runs on its own thread and calls
//! [`Device::poll_status`](crate::device::Device::poll_status) on
//! every device once per interval, publishing each result on a channel.
//! Stopping is immediate: the thread is signalled and unparked but not
//! joined, and a read that completes after the stop is dropped instead of
//! being published.

use crate::device::SharedDevice;
use crate::simulation::sleep_until;
use actuator_common::address::SlaveAddress;
use actuator_common::config::MIN_POLL_INTERVAL;
use actuator_common::error::{ActuatorError, ActuatorResult};
use actuator_protocol::status::ActuatorStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// One poll outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    /// Polled slave.
    pub slave: SlaveAddress,
    /// Polling round the result belongs to, starting at 0.
    pub round: u64,
    /// Decoded status or the failure.
    pub result: ActuatorResult<ActuatorStatus>,
}

#[derive(Debug)]
struct PollerState {
    stop_requested: AtomicBool,
    running: AtomicBool,
    rounds: AtomicU64,
    outlet: Mutex<Option<Sender<PollReport>>>,
}

impl PollerState {
    /// Send a report unless the poller has been stopped.
    fn publish(&self, report: PollReport) -> bool {
        let Ok(outlet) = self.outlet.lock() else {
            return false;
        };
        match outlet.as_ref() {
            Some(tx) => tx.send(report).is_ok(),
            None => {
                trace!(slave = %report.slave, "Discarding poll result after stop");
                false
            }
        }
    }

    fn close(&self) {
        if let Ok(mut outlet) = self.outlet.lock() {
            outlet.take();
        }
    }
}

/// Read-only view of a poller's state.
#[derive(Debug, Clone)]
pub struct PollerMonitor(Arc<PollerState>);

impl PollerMonitor {
    /// Check if the poller is active. False as soon as a stop is requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.running.load(Ordering::Acquire)
    }

    /// Completed polling rounds.
    #[must_use]
    pub fn rounds(&self) -> u64 {
        self.0.rounds.load(Ordering::Acquire)
    }
}

/// Background status poller.
#[derive(Debug)]
pub struct Poller {
    state: Arc<PollerState>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `devices` every `interval`.
    ///
    /// The first round runs immediately.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `interval` is below the 100 ms minimum.
    pub fn start(
        devices: Vec<SharedDevice>,
        interval: Duration,
    ) -> ActuatorResult<(Self, Receiver<PollReport>)> {
        if interval < MIN_POLL_INTERVAL {
            return Err(ActuatorError::out_of_range(
                "polling interval (ms)",
                u32::try_from(interval.as_millis()).unwrap_or(u32::MAX),
                u32::try_from(MIN_POLL_INTERVAL.as_millis()).unwrap_or(u32::MAX),
                u32::MAX,
            ));
        }

        let (tx, rx) = mpsc::channel();
        info!(
            interval_ms = interval.as_millis(),
            devices = devices.len(),
            "Starting poller"
        );

        let state = Arc::new(PollerState {
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
            rounds: AtomicU64::new(0),
            outlet: Mutex::new(Some(tx)),
        });
        let thread_state = Arc::clone(&state);

        let handle = thread::Builder::new()
            .name("actuator-poller".into())
            .spawn(move || run(&thread_state, &devices, interval))
            .map_err(|e| {
                state.running.store(false, Ordering::Release);
                ActuatorError::Validation(format!("failed to spawn poller thread: {e}"))
            })?;

        Ok((
            Self {
                state,
                interval,
                handle: Some(handle),
            },
            rx,
        ))
    }

    /// Polling interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the poller is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Shareable view of this poller's state.
    #[must_use]
    pub fn monitor(&self) -> PollerMonitor {
        PollerMonitor(Arc::clone(&self.state))
    }

    /// Stop polling without waiting for an in-flight read.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!("Stopping poller");
        self.state.stop_requested.store(true, Ordering::Release);
        self.state.running.store(false, Ordering::Release);
        self.state.close();
        handle.thread().unpark();
        if handle.is_finished() {
            if let Err(e) = handle.join() {
                warn!("Poller thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(state: &PollerState, devices: &[SharedDevice], interval: Duration) {
    debug!("Poller thread started");
    let mut round = 0u64;
    'rounds: while !state.stop_requested.load(Ordering::Acquire) {
        let deadline = Instant::now() + interval;
        for device in devices {
            if state.stop_requested.load(Ordering::Acquire) {
                break 'rounds;
            }
            let report = poll_device(device, round);
            if !state.publish(report) {
                break 'rounds;
            }
        }
        round += 1;
        state.rounds.store(round, Ordering::Release);
        sleep_until(deadline, &state.stop_requested);
    }
    state.running.store(false, Ordering::Release);
    state.close();
    debug!(rounds = round, "Poller thread stopped");
}

/// Poll one device, reporting a poisoned device lock as a failed poll.
pub fn poll_device(device: &SharedDevice, round: u64) -> PollReport {
    match device.lock() {
        Ok(mut guard) => {
            let slave = guard.address();
            let result = guard.poll_status();
            if let Err(e) = &result {
                warn!(slave = %slave, error = %e, "Status poll failed");
            }
            PollReport {
                slave,
                round,
                result,
            }
        }
        Err(poisoned) => {
            let slave = poisoned.get_ref().address();
            PollReport {
                slave,
                round,
                result: Err(ActuatorError::Communication("device lock poisoned".into())),
            }
        }
    }
}
