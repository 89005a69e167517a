//! Tagged field types stored in configuration registers.
//!
//! Every single-bit setting is a two-state enum implementing [`TwoState`],
//! and every enumerated scalar register implements [`RegisterEnum`] so
//! that out-of-range register values decode to a documented default.

use serde::{Deserialize, Serialize};

/// A setting backed by exactly one register bit.
pub trait TwoState: Copy {
    /// Build the setting from its bit value.
    fn from_bit(set: bool) -> Self;

    /// Bit value to store for this setting.
    fn is_set(self) -> bool;
}

/// An enumerated setting backed by one whole register.
pub trait RegisterEnum: Copy + Default {
    /// Field name used in diagnostics.
    const NAME: &'static str;

    /// Largest raw value that maps to a member.
    const MAX_RAW: u16;

    /// Strict conversion, `None` for values with no member.
    fn try_from_raw(raw: u16) -> Option<Self>;

    /// Register value for this member.
    fn raw(self) -> u16;

    /// Lenient conversion: unknown values map to the default member.
    fn from_raw(raw: u16) -> Self {
        Self::try_from_raw(raw).unwrap_or_default()
    }
}

/// Actuation principle (function register bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Actuation {
    /// Powered in both directions.
    #[default]
    DoubleAction,
    /// Powered one way, spring returns the other.
    SpringReturn,
}

impl TwoState for Actuation {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::SpringReturn
        } else {
            Self::DoubleAction
        }
    }

    fn is_set(self) -> bool {
        self == Self::SpringReturn
    }
}

/// Discrete input command style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Actuator runs only while the input is held.
    #[default]
    Maintained,
    /// A pulse latches the command until stop or limit.
    Momentary,
}

impl TwoState for InputMode {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::Momentary
        } else {
            Self::Maintained
        }
    }

    fn is_set(self) -> bool {
        self == Self::Momentary
    }
}

/// Electrical polarity of a discrete input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputPolarity {
    /// Energized input means asserted.
    #[default]
    ActiveHigh,
    /// De-energized input means asserted.
    ActiveLow,
}

impl TwoState for InputPolarity {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }

    fn is_set(self) -> bool {
        self == Self::ActiveLow
    }
}

/// How a discrete input is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEdge {
    /// Acts on the input level.
    #[default]
    Level,
    /// Acts on the input transition.
    Edge,
}

impl TwoState for TriggerEdge {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::Edge
        } else {
            Self::Level
        }
    }

    fn is_set(self) -> bool {
        self == Self::Edge
    }
}

/// Output shaft rotation that closes the valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Clockwise to close.
    #[default]
    Clockwise,
    /// Counter-clockwise to close.
    CounterClockwise,
}

impl TwoState for Rotation {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::CounterClockwise
        } else {
            Self::Clockwise
        }
    }

    fn is_set(self) -> bool {
        self == Self::CounterClockwise
    }
}

/// End-of-travel seating criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeatMode {
    /// Stop at the position limit.
    #[default]
    Position,
    /// Drive into the seat until torque trips.
    Torque,
}

impl TwoState for SeatMode {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::Torque
        } else {
            Self::Position
        }
    }

    fn is_set(self) -> bool {
        self == Self::Torque
    }
}

/// Analog signal type for an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// 4-20 mA current loop.
    #[default]
    Current,
    /// 0-10 V.
    Voltage,
}

impl TwoState for SignalType {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::Voltage
        } else {
            Self::Current
        }
    }

    fn is_set(self) -> bool {
        self == Self::Voltage
    }
}

/// Generic enable bit (enable register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Enable {
    /// Feature off.
    #[default]
    Disabled,
    /// Feature on.
    Enabled,
}

impl TwoState for Enable {
    fn from_bit(set: bool) -> Self {
        if set {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    fn is_set(self) -> bool {
        self == Self::Enabled
    }
}

/// Command source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Local station only.
    #[default]
    Local,
    /// Remote two-wire (maintained) control.
    TwoWire,
    /// Remote three-wire (open/close/stop) control.
    ThreeWire,
    /// Analog setpoint positioning.
    Modulating,
    /// Network commands.
    Network,
}

impl RegisterEnum for ControlMode {
    const NAME: &'static str = "control mode";
    const MAX_RAW: u16 = 4;

    fn try_from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Local),
            1 => Some(Self::TwoWire),
            2 => Some(Self::ThreeWire),
            3 => Some(Self::Modulating),
            4 => Some(Self::Network),
            _ => None,
        }
    }

    fn raw(self) -> u16 {
        match self {
            Self::Local => 0,
            Self::TwoWire => 1,
            Self::ThreeWire => 2,
            Self::Modulating => 3,
            Self::Network => 4,
        }
    }
}

/// Action taken on ESD or loss of communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailsafeAction {
    /// Hold the current position.
    #[default]
    StayPut,
    /// Drive fully open.
    Open,
    /// Drive fully closed.
    Close,
}

impl RegisterEnum for FailsafeAction {
    const NAME: &'static str = "failsafe action";
    const MAX_RAW: u16 = 2;

    fn try_from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::StayPut),
            1 => Some(Self::Open),
            2 => Some(Self::Close),
            _ => None,
        }
    }

    fn raw(self) -> u16 {
        match self {
            Self::StayPut => 0,
            Self::Open => 1,
            Self::Close => 2,
        }
    }
}

/// Installed network option card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkAdapter {
    /// No card fitted.
    #[default]
    None,
    /// Modbus RTU.
    ModbusRtu,
    /// Profibus DP.
    Profibus,
    /// DeviceNet.
    DeviceNet,
    /// Foundation Fieldbus H1.
    FoundationFieldbus,
}

impl RegisterEnum for NetworkAdapter {
    const NAME: &'static str = "network adapter";
    const MAX_RAW: u16 = 4;

    fn try_from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::ModbusRtu),
            2 => Some(Self::Profibus),
            3 => Some(Self::DeviceNet),
            4 => Some(Self::FoundationFieldbus),
            _ => None,
        }
    }

    fn raw(self) -> u16 {
        match self {
            Self::None => 0,
            Self::ModbusRtu => 1,
            Self::Profibus => 2,
            Self::DeviceNet => 3,
            Self::FoundationFieldbus => 4,
        }
    }
}

/// Network baud rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaudRate {
    /// 1200 bit/s.
    B1200,
    /// 2400 bit/s.
    B2400,
    /// 4800 bit/s.
    B4800,
    /// 9600 bit/s.
    #[default]
    B9600,
    /// 19200 bit/s.
    B19200,
    /// 38400 bit/s.
    B38400,
    /// 57600 bit/s.
    B57600,
    /// 115200 bit/s.
    B115200,
}

impl BaudRate {
    /// Line rate in bits per second.
    #[must_use]
    pub fn bits_per_second(self) -> u32 {
        match self {
            Self::B1200 => 1200,
            Self::B2400 => 2400,
            Self::B4800 => 4800,
            Self::B9600 => 9600,
            Self::B19200 => 19_200,
            Self::B38400 => 38_400,
            Self::B57600 => 57_600,
            Self::B115200 => 115_200,
        }
    }
}

impl RegisterEnum for BaudRate {
    const NAME: &'static str = "baud rate";
    const MAX_RAW: u16 = 7;

    fn try_from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::B1200),
            1 => Some(Self::B2400),
            2 => Some(Self::B4800),
            3 => Some(Self::B9600),
            4 => Some(Self::B19200),
            5 => Some(Self::B38400),
            6 => Some(Self::B57600),
            7 => Some(Self::B115200),
            _ => None,
        }
    }

    fn raw(self) -> u16 {
        match self {
            Self::B1200 => 0,
            Self::B2400 => 1,
            Self::B4800 => 2,
            Self::B9600 => 3,
            Self::B19200 => 4,
            Self::B38400 => 5,
            Self::B57600 => 6,
            Self::B115200 => 7,
        }
    }
}

/// Network parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl RegisterEnum for Parity {
    const NAME: &'static str = "parity";
    const MAX_RAW: u16 = 2;

    fn try_from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Even),
            2 => Some(Self::Odd),
            _ => None,
        }
    }

    fn raw(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Even => 1,
            Self::Odd => 2,
        }
    }
}
