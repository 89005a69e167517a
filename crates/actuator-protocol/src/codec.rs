//! Configuration record and its register encoding.
//!
//! [`encode`] and [`decode`] are exact inverses for valid configurations.
//! Decoding never fails: every bit decodes independently and every scalar
//! is clamped or defaulted, so a corrupted block still yields a usable
//! record. [`validate_registers`] reports what decoding had to repair.

use crate::flags::{
    Actuation, BaudRate, ControlMode, Enable, FailsafeAction, InputMode, InputPolarity,
    NetworkAdapter, Parity, RegisterEnum, Rotation, SeatMode, SignalType, TriggerEdge, TwoState,
};
use crate::register_map::{
    BAUD_RATE, CALIBRATION_LEN, CALIBRATION_START, CONFIG_LEN, CONTROL_MODE, DEADBAND,
    ENABLE_REGISTER, ESD_ACTION, ESD_DELAY, FUNCTION_REGISTER, LINK_ADDRESS, LOSS_OF_COMM_ACTION,
    LOSS_OF_COMM_DELAY, MODULATION_DELAY, NETWORK_ADAPTER, PARITY, SPEED_CURVE_START,
    SPEED_SETTING, TORQUE_LIMIT,
};
use actuator_common::error::{ActuatorError, ActuatorResult};
use serde::{Deserialize, Serialize};

/// Highest calibration count (12-bit converters).
pub const CALIBRATION_MAX: u16 = 4095;

/// Highest percentage value.
pub const PERCENT_MAX: u8 = 100;

/// Mask of defined bits in the enable register.
pub const ENABLE_MASK: u16 = 0x3FFF;

/// Encoded configuration block, indexed by register address.
pub type ConfigBlock = [u16; CONFIG_LEN as usize];

/// Function register flags, bit 0 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionFlags {
    /// Bit 0.
    pub actuation: Actuation,
    /// Bit 1.
    pub local_input_mode: InputMode,
    /// Bit 2.
    pub remote_input_mode: InputMode,
    /// Bit 3.
    pub open_input_polarity: InputPolarity,
    /// Bit 4.
    pub close_input_polarity: InputPolarity,
    /// Bit 5.
    pub stop_input_polarity: InputPolarity,
    /// Bit 6.
    pub esd_input_polarity: InputPolarity,
    /// Bit 7.
    pub open_input_trigger: TriggerEdge,
    /// Bit 8.
    pub close_input_trigger: TriggerEdge,
    /// Bit 9.
    pub stop_input_trigger: TriggerEdge,
    /// Bit 10.
    pub esd_input_trigger: TriggerEdge,
    /// Bit 11.
    pub close_direction: Rotation,
    /// Bit 12.
    pub close_seat: SeatMode,
    /// Bit 13.
    pub open_seat: SeatMode,
    /// Bit 14.
    pub analog_input_signal: SignalType,
    /// Bit 15.
    pub analog_output_signal: SignalType,
}

impl FunctionFlags {
    /// Pack into the function register.
    #[must_use]
    pub fn pack(&self) -> u16 {
        pack_bits(&[
            self.actuation.is_set(),
            self.local_input_mode.is_set(),
            self.remote_input_mode.is_set(),
            self.open_input_polarity.is_set(),
            self.close_input_polarity.is_set(),
            self.stop_input_polarity.is_set(),
            self.esd_input_polarity.is_set(),
            self.open_input_trigger.is_set(),
            self.close_input_trigger.is_set(),
            self.stop_input_trigger.is_set(),
            self.esd_input_trigger.is_set(),
            self.close_direction.is_set(),
            self.close_seat.is_set(),
            self.open_seat.is_set(),
            self.analog_input_signal.is_set(),
            self.analog_output_signal.is_set(),
        ])
    }

    /// Unpack from the function register. All 16 bits are defined.
    #[must_use]
    pub fn unpack(word: u16) -> Self {
        let bit = |n: u16| word & (1 << n) != 0;
        Self {
            actuation: Actuation::from_bit(bit(0)),
            local_input_mode: InputMode::from_bit(bit(1)),
            remote_input_mode: InputMode::from_bit(bit(2)),
            open_input_polarity: InputPolarity::from_bit(bit(3)),
            close_input_polarity: InputPolarity::from_bit(bit(4)),
            stop_input_polarity: InputPolarity::from_bit(bit(5)),
            esd_input_polarity: InputPolarity::from_bit(bit(6)),
            open_input_trigger: TriggerEdge::from_bit(bit(7)),
            close_input_trigger: TriggerEdge::from_bit(bit(8)),
            stop_input_trigger: TriggerEdge::from_bit(bit(9)),
            esd_input_trigger: TriggerEdge::from_bit(bit(10)),
            close_direction: Rotation::from_bit(bit(11)),
            close_seat: SeatMode::from_bit(bit(12)),
            open_seat: SeatMode::from_bit(bit(13)),
            analog_input_signal: SignalType::from_bit(bit(14)),
            analog_output_signal: SignalType::from_bit(bit(15)),
        }
    }
}

/// Enable register flags, bit 0 first. Bits 14 and 15 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnableFlags {
    /// Bit 0: back off after torque seating.
    pub torque_backseat: Enable,
    /// Bit 1: retry after a torque trip.
    pub torque_retry: Enable,
    /// Bit 2.
    pub remote_display: Enable,
    /// Bit 3.
    pub status_leds: Enable,
    /// Bit 4.
    pub open_inhibit: Enable,
    /// Bit 5.
    pub close_inhibit: Enable,
    /// Bit 6: ESD overrides motor thermal protection.
    pub esd_override_thermal: Enable,
    /// Bit 7: ESD overrides local control.
    pub esd_override_local: Enable,
    /// Bit 8: ESD overrides stop.
    pub esd_override_stop: Enable,
    /// Bit 9: ESD overrides open/close inhibits.
    pub esd_override_inhibit: Enable,
    /// Bit 10.
    pub speed_control_open: Enable,
    /// Bit 11.
    pub speed_control_close: Enable,
    /// Bit 12.
    pub partial_stroke: Enable,
    /// Bit 13.
    pub interrupter_timer: Enable,
}

impl EnableFlags {
    /// Pack into the enable register; reserved bits are written as zero.
    #[must_use]
    pub fn pack(&self) -> u16 {
        pack_bits(&[
            self.torque_backseat.is_set(),
            self.torque_retry.is_set(),
            self.remote_display.is_set(),
            self.status_leds.is_set(),
            self.open_inhibit.is_set(),
            self.close_inhibit.is_set(),
            self.esd_override_thermal.is_set(),
            self.esd_override_local.is_set(),
            self.esd_override_stop.is_set(),
            self.esd_override_inhibit.is_set(),
            self.speed_control_open.is_set(),
            self.speed_control_close.is_set(),
            self.partial_stroke.is_set(),
            self.interrupter_timer.is_set(),
        ])
    }

    /// Unpack from the enable register, ignoring reserved bits.
    #[must_use]
    pub fn unpack(word: u16) -> Self {
        let bit = |n: u16| Enable::from_bit(word & (1 << n) != 0);
        Self {
            torque_backseat: bit(0),
            torque_retry: bit(1),
            remote_display: bit(2),
            status_leds: bit(3),
            open_inhibit: bit(4),
            close_inhibit: bit(5),
            esd_override_thermal: bit(6),
            esd_override_local: bit(7),
            esd_override_stop: bit(8),
            esd_override_inhibit: bit(9),
            speed_control_open: bit(10),
            speed_control_close: bit(11),
            partial_stroke: bit(12),
            interrupter_timer: bit(13),
        }
    }
}

fn pack_bits(bits: &[bool]) -> u16 {
    bits.iter()
        .enumerate()
        .filter(|&(_, &set)| set)
        .fold(0u16, |word, (n, _)| word | (1 << n))
}

/// Speed-control curve segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeedCurve {
    /// Position (percent of stroke) where the curve starts.
    pub start: u8,
    /// Speed ratio applied after `start`.
    pub ratio: u8,
}

/// Network option card settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Installed adapter.
    pub adapter: NetworkAdapter,
    /// Line rate.
    pub baud_rate: BaudRate,
    /// Parity.
    pub parity: Parity,
    /// Link-layer address bytes.
    pub link_address: [u8; 2],
    /// Action when the network goes quiet.
    pub loss_of_comm_action: FailsafeAction,
    /// Seconds of silence before `loss_of_comm_action`.
    pub loss_of_comm_delay: u8,
}

/// Zero/span counts for one analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPair {
    /// Counts at 0 %.
    pub zero: u16,
    /// Counts at 100 %.
    pub span: u16,
}

impl Default for CalibrationPair {
    fn default() -> Self {
        Self {
            zero: 0,
            span: CALIBRATION_MAX,
        }
    }
}

/// Calibration words for both analog inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Analog input 1.
    pub analog_input_1: CalibrationPair,
    /// Analog input 2.
    pub analog_input_2: CalibrationPair,
    /// Analog output 1.
    pub analog_output_1: CalibrationPair,
    /// Analog output 2.
    pub analog_output_2: CalibrationPair,
}

impl Calibration {
    /// Words in register order.
    #[must_use]
    pub fn words(&self) -> [u16; CALIBRATION_LEN as usize] {
        [
            self.analog_input_1.zero,
            self.analog_input_1.span,
            self.analog_input_2.zero,
            self.analog_input_2.span,
            self.analog_output_1.zero,
            self.analog_output_1.span,
            self.analog_output_2.zero,
            self.analog_output_2.span,
        ]
    }

    /// Build from words in register order, saturating each at 4095.
    #[must_use]
    pub fn from_words(words: &[u16]) -> Self {
        let w = |i: usize| words.get(i).copied().unwrap_or(0).min(CALIBRATION_MAX);
        let pair = |i: usize| CalibrationPair {
            zero: w(i),
            span: w(i + 1),
        };
        Self {
            analog_input_1: pair(0),
            analog_input_2: pair(2),
            analog_output_1: pair(4),
            analog_output_2: pair(6),
        }
    }
}

/// Complete actuator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfiguration {
    /// Function register.
    pub function: FunctionFlags,
    /// Enable register.
    pub enable: EnableFlags,
    /// Command source.
    pub control_mode: ControlMode,
    /// Modulation delay (tenths of a second).
    pub modulation_delay: u8,
    /// Modulation deadband (tenths of a percent).
    pub deadband: u8,
    /// ESD action.
    pub esd_action: FailsafeAction,
    /// Seconds before the ESD action executes.
    pub esd_delay: u8,
    /// Torque limit, percent of rated torque.
    pub torque_limit: u8,
    /// Travel speed, percent of rated speed.
    pub speed_setting: u8,
    /// Two speed-control curve segments.
    pub speed_curves: [SpeedCurve; 2],
    /// Network settings.
    pub network: NetworkSettings,
    /// Analog calibration.
    pub calibration: Calibration,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            function: FunctionFlags::default(),
            enable: EnableFlags::default(),
            control_mode: ControlMode::default(),
            modulation_delay: 0,
            deadband: 10,
            esd_action: FailsafeAction::default(),
            esd_delay: 0,
            torque_limit: PERCENT_MAX,
            speed_setting: PERCENT_MAX,
            speed_curves: [SpeedCurve::default(); 2],
            network: NetworkSettings::default(),
            calibration: Calibration::default(),
        }
    }
}

impl DeviceConfiguration {
    /// Reject values a device would not accept.
    ///
    /// Decoded configurations always pass; this guards caller-built records
    /// before they are written.
    pub fn validate(&self) -> ActuatorResult<()> {
        if self.torque_limit > PERCENT_MAX {
            return Err(ActuatorError::Validation(format!(
                "torque limit {}% exceeds {PERCENT_MAX}%",
                self.torque_limit
            )));
        }
        if self.speed_setting > PERCENT_MAX {
            return Err(ActuatorError::Validation(format!(
                "speed setting {}% exceeds {PERCENT_MAX}%",
                self.speed_setting
            )));
        }
        if let Some(word) = self
            .calibration
            .words()
            .into_iter()
            .find(|&w| w > CALIBRATION_MAX)
        {
            return Err(ActuatorError::Validation(format!(
                "calibration count {word} exceeds {CALIBRATION_MAX}"
            )));
        }
        Ok(())
    }
}

/// Encode a configuration into its register block.
#[must_use]
pub fn encode(config: &DeviceConfiguration) -> ConfigBlock {
    let mut block = [0u16; CONFIG_LEN as usize];
    let mut put = |address: u16, value: u16| block[usize::from(address)] = value;

    put(FUNCTION_REGISTER, config.function.pack());
    put(ENABLE_REGISTER, config.enable.pack());
    put(CONTROL_MODE, config.control_mode.raw());
    put(MODULATION_DELAY, u16::from(config.modulation_delay));
    put(DEADBAND, u16::from(config.deadband));
    put(ESD_ACTION, config.esd_action.raw());
    put(ESD_DELAY, u16::from(config.esd_delay));
    put(TORQUE_LIMIT, u16::from(config.torque_limit));
    put(SPEED_SETTING, u16::from(config.speed_setting));
    for (i, curve) in (0u16..).zip(config.speed_curves.iter()) {
        put(SPEED_CURVE_START + 2 * i, u16::from(curve.start));
        put(SPEED_CURVE_START + 2 * i + 1, u16::from(curve.ratio));
    }
    put(NETWORK_ADAPTER, config.network.adapter.raw());
    put(BAUD_RATE, config.network.baud_rate.raw());
    put(PARITY, config.network.parity.raw());
    put(LINK_ADDRESS, u16::from(config.network.link_address[0]));
    put(LINK_ADDRESS + 1, u16::from(config.network.link_address[1]));
    put(LOSS_OF_COMM_ACTION, config.network.loss_of_comm_action.raw());
    put(LOSS_OF_COMM_DELAY, u16::from(config.network.loss_of_comm_delay));
    for (offset, word) in (0u16..).zip(config.calibration.words()) {
        put(CALIBRATION_START + offset, word);
    }
    block
}

/// Decode a register block starting at register 0.
///
/// Missing trailing registers read as zero.
#[must_use]
pub fn decode(registers: &[u16]) -> DeviceConfiguration {
    let reg = |address: u16| registers.get(usize::from(address)).copied().unwrap_or(0);
    let byte = |address: u16| u8::try_from(reg(address)).unwrap_or(u8::MAX);
    let percent = |address: u16| byte(address).min(PERCENT_MAX);
    let curve = |i: u16| SpeedCurve {
        start: byte(SPEED_CURVE_START + 2 * i),
        ratio: byte(SPEED_CURVE_START + 2 * i + 1),
    };
    let calibration_start = usize::from(CALIBRATION_START);

    DeviceConfiguration {
        function: FunctionFlags::unpack(reg(FUNCTION_REGISTER)),
        enable: EnableFlags::unpack(reg(ENABLE_REGISTER)),
        control_mode: ControlMode::from_raw(reg(CONTROL_MODE)),
        modulation_delay: byte(MODULATION_DELAY),
        deadband: byte(DEADBAND),
        esd_action: FailsafeAction::from_raw(reg(ESD_ACTION)),
        esd_delay: byte(ESD_DELAY),
        torque_limit: percent(TORQUE_LIMIT),
        speed_setting: percent(SPEED_SETTING),
        speed_curves: [curve(0), curve(1)],
        network: NetworkSettings {
            adapter: NetworkAdapter::from_raw(reg(NETWORK_ADAPTER)),
            baud_rate: BaudRate::from_raw(reg(BAUD_RATE)),
            parity: Parity::from_raw(reg(PARITY)),
            link_address: [byte(LINK_ADDRESS), byte(LINK_ADDRESS + 1)],
            loss_of_comm_action: FailsafeAction::from_raw(reg(LOSS_OF_COMM_ACTION)),
            loss_of_comm_delay: byte(LOSS_OF_COMM_DELAY),
        },
        calibration: Calibration::from_words(registers.get(calibration_start..).unwrap_or(&[])),
    }
}

/// Report the first register whose raw value [`decode`] would have to repair.
///
/// Returns [`ActuatorError::OutOfRange`] naming the field.
pub fn validate_registers(registers: &[u16]) -> ActuatorResult<()> {
    let reg = |address: u16| u32::from(registers.get(usize::from(address)).copied().unwrap_or(0));
    let check = |what: &str, address: u16, max: u32| {
        let value = reg(address);
        if value > max {
            Err(ActuatorError::out_of_range(
                format!("{what} (register {address})"),
                value,
                0,
                max,
            ))
        } else {
            Ok(())
        }
    };
    fn enum_max<E: RegisterEnum>() -> u32 {
        u32::from(E::MAX_RAW)
    }
    let byte_max = u32::from(u8::MAX);
    let percent_max = u32::from(PERCENT_MAX);

    check("enable register", ENABLE_REGISTER, u32::from(ENABLE_MASK))?;
    check(ControlMode::NAME, CONTROL_MODE, enum_max::<ControlMode>())?;
    check("modulation delay", MODULATION_DELAY, byte_max)?;
    check("deadband", DEADBAND, byte_max)?;
    check(FailsafeAction::NAME, ESD_ACTION, enum_max::<FailsafeAction>())?;
    check("ESD delay", ESD_DELAY, byte_max)?;
    check("torque limit", TORQUE_LIMIT, percent_max)?;
    check("speed setting", SPEED_SETTING, percent_max)?;
    for address in SPEED_CURVE_START..NETWORK_ADAPTER {
        check("speed curve", address, byte_max)?;
    }
    check(NetworkAdapter::NAME, NETWORK_ADAPTER, enum_max::<NetworkAdapter>())?;
    check(BaudRate::NAME, BAUD_RATE, enum_max::<BaudRate>())?;
    check(Parity::NAME, PARITY, enum_max::<Parity>())?;
    check("link address", LINK_ADDRESS, byte_max)?;
    check("link address", LINK_ADDRESS + 1, byte_max)?;
    check(FailsafeAction::NAME, LOSS_OF_COMM_ACTION, enum_max::<FailsafeAction>())?;
    check("loss-of-comm delay", LOSS_OF_COMM_DELAY, byte_max)?;
    for address in CALIBRATION_START..CALIBRATION_START + CALIBRATION_LEN {
        check("calibration", address, u32::from(CALIBRATION_MAX))?;
    }
    Ok(())
}
