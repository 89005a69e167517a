//! Holding register and coil addresses.
//!
//! ```text
//!  0        function register (16 flags)
//!  1        enable register (14 flags, bits 14-15 reserved)
//!  2..=12   scalars: control mode, modulation delay, deadband, ESD action,
//!           ESD delay, torque limit, speed setting, speed curves
//! 13..=19   network: adapter, baud, parity, link address x2,
//!           loss-of-comm action, loss-of-comm delay
//! 20..=27   calibration: AI1, AI2, AO1, AO2 zero/span
//! 64..=68   status block (read-only)
//! ```

use serde::{Deserialize, Serialize};

/// Function register (16 two-state flags).
pub const FUNCTION_REGISTER: u16 = 0;
/// Enable register (14 two-state flags).
pub const ENABLE_REGISTER: u16 = 1;
/// Control mode enum.
pub const CONTROL_MODE: u16 = 2;
/// Modulation delay byte.
pub const MODULATION_DELAY: u16 = 3;
/// Deadband byte.
pub const DEADBAND: u16 = 4;
/// ESD action enum.
pub const ESD_ACTION: u16 = 5;
/// ESD delay byte.
pub const ESD_DELAY: u16 = 6;
/// Torque limit, percent.
pub const TORQUE_LIMIT: u16 = 7;
/// Speed setting, percent.
pub const SPEED_SETTING: u16 = 8;
/// First speed curve start byte; start/ratio pairs follow.
pub const SPEED_CURVE_START: u16 = 9;
/// Network adapter enum.
pub const NETWORK_ADAPTER: u16 = 13;
/// Network baud rate enum.
pub const BAUD_RATE: u16 = 14;
/// Network parity enum.
pub const PARITY: u16 = 15;
/// First link-layer address byte; the second follows.
pub const LINK_ADDRESS: u16 = 16;
/// Loss-of-communication action enum.
pub const LOSS_OF_COMM_ACTION: u16 = 18;
/// Loss-of-communication delay byte.
pub const LOSS_OF_COMM_DELAY: u16 = 19;
/// First calibration word.
pub const CALIBRATION_START: u16 = 20;
/// Number of calibration words.
pub const CALIBRATION_LEN: u16 = 8;

/// First configuration register.
pub const CONFIG_START: u16 = 0;
/// Registers written by a configuration write (everything except calibration).
pub const CONFIG_WRITE_LEN: u16 = CALIBRATION_START;
/// Full configuration block length.
pub const CONFIG_LEN: u16 = CALIBRATION_START + CALIBRATION_LEN;

/// Status word.
pub const STATUS_WORD: u16 = 64;
/// Raw position.
pub const POSITION_RAW: u16 = 65;
/// Raw torque.
pub const TORQUE_RAW: u16 = 66;
/// Product identifier.
pub const PRODUCT_ID: u16 = 67;
/// Firmware revision.
pub const FIRMWARE_REVISION: u16 = 68;
/// First status register.
pub const STATUS_START: u16 = STATUS_WORD;
/// Status block length.
pub const STATUS_LEN: u16 = 5;

/// Number of holding registers a device exposes.
pub const BANK_SIZE: u16 = 80;

/// Open command coil.
pub const COIL_OPEN: u16 = 0;
/// Close command coil.
pub const COIL_CLOSE: u16 = 1;
/// Stop command coil.
pub const COIL_STOP: u16 = 2;
/// Soft setup-mode coil.
pub const COIL_SETUP: u16 = 3;
/// Number of coils a device exposes.
pub const COIL_COUNT: u16 = 4;

/// Returns true if `address` lies in the read-only status block.
#[must_use]
pub fn is_status_register(address: u16) -> bool {
    (STATUS_START..STATUS_START + STATUS_LEN).contains(&address)
}

/// Motion command written to a command coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Drive toward the open limit.
    Open,
    /// Drive toward the close limit.
    Close,
    /// Halt motion.
    Stop,
}

impl CommandKind {
    /// Coil address for this command.
    #[must_use]
    pub fn coil(self) -> u16 {
        match self {
            Self::Open => COIL_OPEN,
            Self::Close => COIL_CLOSE,
            Self::Stop => COIL_STOP,
        }
    }

    /// Command for a coil address, if it is a command coil.
    #[must_use]
    pub fn from_coil(address: u16) -> Option<Self> {
        match address {
            COIL_OPEN => Some(Self::Open),
            COIL_CLOSE => Some(Self::Close),
            COIL_STOP => Some(Self::Stop),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::Stop => write!(f, "stop"),
        }
    }
}
