//! Status word and analog register decoding.
//!
//! The raw status block is a status word followed by position and torque
//! registers. Two raw conventions exist for the analog registers, see
//! [`RawScale`]. The decoder enforces the snapshot invariants even when the
//! device reports contradictory bits:
//!
//! - open and close limits are never both reported
//! - a moving actuator reports no limit
//! - torque never exceeds the configured torque limit

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status word bit assignments.
pub mod bits {
    /// Supply healthy.
    pub const POWER_OK: u16 = 1 << 0;
    /// Device sees its host link.
    pub const COMMUNICATION_OK: u16 = 1 << 1;
    /// Position sensor calibrated.
    pub const CALIBRATED: u16 = 1 << 2;
    /// Motor running.
    pub const MOVING: u16 = 1 << 3;
    /// Travelling toward open.
    pub const OPENING: u16 = 1 << 4;
    /// Travelling toward close.
    pub const CLOSING: u16 = 1 << 5;
    /// Open end-stop reached.
    pub const OPEN_LIMIT: u16 = 1 << 6;
    /// Close end-stop reached.
    pub const CLOSE_LIMIT: u16 = 1 << 7;
    /// Soft setup mode active.
    pub const SETUP_MODE: u16 = 1 << 8;
    /// First alarm bit; alarms occupy bits 9..=15.
    pub const ALARM_SHIFT: u16 = 9;
}

/// Raw domain of the position and torque registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RawScale {
    /// 0–1000, tenths of a percent.
    #[default]
    Permille,
    /// 0–4095, 12-bit converter counts.
    Counts12Bit,
}

impl RawScale {
    /// Raw counts per percent.
    #[must_use]
    pub fn divisor(self) -> f32 {
        match self {
            Self::Permille => 10.0,
            Self::Counts12Bit => 40.95,
        }
    }

    /// Convert a raw register to a 0–100 percentage.
    #[must_use]
    pub fn to_percent(self, raw: u16) -> f32 {
        (f32::from(raw) / self.divisor()).clamp(0.0, 100.0)
    }

    /// Convert a percentage to the nearest raw register value.
    #[must_use]
    pub fn to_raw(self, percent: f32) -> u16 {
        (percent.clamp(0.0, 100.0) * self.divisor()).round() as u16
    }
}

/// Named alarm flags (status word bits 9..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Alarms {
    /// Torque trip mid-stroke.
    pub overtorque: bool,
    /// Motor thermostat open.
    pub motor_overtemp: bool,
    /// Emergency shutdown input asserted.
    pub esd_active: bool,
    /// Analog command signal lost.
    pub loss_of_signal: bool,
    /// Position sensor fault.
    pub position_fault: bool,
    /// Supply phase missing.
    pub phase_loss: bool,
    /// Backup battery low.
    pub low_battery: bool,
}

impl Alarms {
    fn flags(&self) -> [(bool, &'static str); 7] {
        [
            (self.overtorque, "overtorque"),
            (self.motor_overtemp, "motor overtemperature"),
            (self.esd_active, "ESD active"),
            (self.loss_of_signal, "loss of signal"),
            (self.position_fault, "position fault"),
            (self.phase_loss, "phase loss"),
            (self.low_battery, "low battery"),
        ]
    }

    /// Decode from a status word.
    #[must_use]
    pub fn from_status_word(word: u16) -> Self {
        let bit = |n: u16| word & (1 << (bits::ALARM_SHIFT + n)) != 0;
        Self {
            overtorque: bit(0),
            motor_overtemp: bit(1),
            esd_active: bit(2),
            loss_of_signal: bit(3),
            position_fault: bit(4),
            phase_loss: bit(5),
            low_battery: bit(6),
        }
    }

    /// Status word bits for these alarms.
    #[must_use]
    pub fn to_status_bits(&self) -> u16 {
        self.flags()
            .iter()
            .enumerate()
            .filter(|&(_, &(set, _))| set)
            .fold(0u16, |word, (n, _)| word | (1 << (usize::from(bits::ALARM_SHIFT) + n)))
    }

    /// Returns true if any alarm is raised.
    #[must_use]
    pub fn any(&self) -> bool {
        self.flags().iter().any(|&(set, _)| set)
    }

    /// Human-readable names of the raised alarms.
    #[must_use]
    pub fn active(&self) -> Vec<&'static str> {
        self.flags()
            .iter()
            .filter(|&&(set, _)| set)
            .map(|&(_, name)| name)
            .collect()
    }
}

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward the open limit.
    Opening,
    /// Toward the close limit.
    Closing,
}

/// Decoded status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorStatus {
    /// Position, percent open.
    pub position: f32,
    /// Output torque, percent of rated.
    pub torque: f32,
    /// Supply healthy.
    pub power_ok: bool,
    /// Device sees its host link.
    pub communication_ok: bool,
    /// Position sensor calibrated.
    pub calibrated: bool,
    /// Motor running.
    pub moving: bool,
    /// Reported direction while moving, if unambiguous.
    pub direction: Option<Direction>,
    /// Open end-stop reached.
    pub open_limit: bool,
    /// Close end-stop reached.
    pub close_limit: bool,
    /// Soft setup mode active.
    pub setup_mode: bool,
    /// Raised alarms.
    pub alarms: Alarms,
}

/// Single human-facing state derived from the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorState {
    /// At least one alarm raised.
    Alarm,
    /// Moving toward open.
    Opening,
    /// Moving toward close.
    Closing,
    /// Resting on the open limit.
    Open,
    /// Resting on the close limit.
    Closed,
    /// Idle mid-stroke.
    Stopped,
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alarm => write!(f, "ALARM"),
            Self::Opening => write!(f, "OPENING"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl ActuatorStatus {
    /// Derive the display state.
    ///
    /// Precedence, highest first: alarm, moving (by direction bit, or by
    /// position above 50 % meaning opening when no direction is reported),
    /// open limit, close limit, stopped.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        if self.alarms.any() {
            return ActuatorState::Alarm;
        }
        if self.moving {
            return match self.direction {
                Some(Direction::Opening) => ActuatorState::Opening,
                Some(Direction::Closing) => ActuatorState::Closing,
                None if self.position > 50.0 => ActuatorState::Opening,
                None => ActuatorState::Closing,
            };
        }
        if self.open_limit {
            ActuatorState::Open
        } else if self.close_limit {
            ActuatorState::Closed
        } else {
            ActuatorState::Stopped
        }
    }
}

/// Stateless status decoder for one raw convention and torque limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusDecoder {
    scale: RawScale,
    torque_limit: f32,
}

impl Default for StatusDecoder {
    fn default() -> Self {
        Self::new(RawScale::default())
    }
}

impl StatusDecoder {
    /// Decoder with no torque limit below full scale.
    #[must_use]
    pub fn new(scale: RawScale) -> Self {
        Self {
            scale,
            torque_limit: 100.0,
        }
    }

    /// Clamp decoded torque to `percent`.
    #[must_use]
    pub fn with_torque_limit(mut self, percent: u8) -> Self {
        self.torque_limit = f32::from(percent.min(100));
        self
    }

    /// Raw convention in use.
    #[must_use]
    pub fn scale(&self) -> RawScale {
        self.scale
    }

    /// Decode a status word and the two analog registers.
    #[must_use]
    pub fn decode(&self, status_word: u16, position_raw: u16, torque_raw: u16) -> ActuatorStatus {
        let bit = |mask: u16| status_word & mask != 0;
        let moving = bit(bits::MOVING);
        let mut open_limit = bit(bits::OPEN_LIMIT);
        let mut close_limit = bit(bits::CLOSE_LIMIT);
        if moving || (open_limit && close_limit) {
            open_limit = false;
            close_limit = false;
        }
        let direction = if moving {
            match (bit(bits::OPENING), bit(bits::CLOSING)) {
                (true, false) => Some(Direction::Opening),
                (false, true) => Some(Direction::Closing),
                _ => None,
            }
        } else {
            None
        };

        ActuatorStatus {
            position: self.scale.to_percent(position_raw),
            torque: self.scale.to_percent(torque_raw).min(self.torque_limit),
            power_ok: bit(bits::POWER_OK),
            communication_ok: bit(bits::COMMUNICATION_OK),
            calibrated: bit(bits::CALIBRATED),
            moving,
            direction,
            open_limit,
            close_limit,
            setup_mode: bit(bits::SETUP_MODE),
            alarms: Alarms::from_status_word(status_word),
        }
    }

    /// Encode a snapshot as `[status word, position raw, torque raw]`.
    #[must_use]
    pub fn encode(&self, status: &ActuatorStatus) -> [u16; 3] {
        let flag = |set: bool, mask: u16| if set { mask } else { 0 };
        let word = flag(status.power_ok, bits::POWER_OK)
            | flag(status.communication_ok, bits::COMMUNICATION_OK)
            | flag(status.calibrated, bits::CALIBRATED)
            | flag(status.moving, bits::MOVING)
            | flag(
                status.direction == Some(Direction::Opening),
                bits::OPENING,
            )
            | flag(
                status.direction == Some(Direction::Closing),
                bits::CLOSING,
            )
            | flag(status.open_limit, bits::OPEN_LIMIT)
            | flag(status.close_limit, bits::CLOSE_LIMIT)
            | flag(status.setup_mode, bits::SETUP_MODE)
            | status.alarms.to_status_bits();
        [
            word,
            self.scale.to_raw(status.position),
            self.scale.to_raw(status.torque),
        ]
    }
}
