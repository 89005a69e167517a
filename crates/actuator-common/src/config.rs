//! Configuration structures for an actuator session.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for bench or plant deployment.

use crate::address::SlaveAddress;
use crate::error::{ActuatorError, ActuatorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest allowed polling period (network-wide views).
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Top-level session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Which transport backs the session.
    pub mode: SessionMode,

    /// Status polling configuration.
    pub polling: PollingConfig,

    /// Simulated device population.
    pub simulation: SimulationConfig,

    /// Serial link parameters for hardware mode.
    pub serial: SerialConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Simulation,
            polling: PollingConfig::default(),
            simulation: SimulationConfig::default(),
            serial: SerialConfig::default(),
        }
    }
}

/// Transport mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// In-process simulated devices.
    #[default]
    Simulation,
    /// Real devices over a serial link.
    Hardware,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "simulation"),
            Self::Hardware => write!(f, "hardware"),
        }
    }
}

/// Status polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Period between status polls of every device.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

/// Simulation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation tick period.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,

    /// Position advance per tick at 100 % speed, in percent of full stroke.
    pub step_size: f32,

    /// Fixed RNG seed for reproducible torque noise.
    pub seed: Option<u64>,

    /// Slaves provisioned when the session opens.
    pub slaves: Vec<SimulatedSlaveConfig>,
}

impl SimulationConfig {
    /// Reject a tick or step size the engine cannot advance with.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Validation`] for a zero tick, a step size
    /// outside (0, 100] (NaN included), or a slave address listed twice.
    pub fn validate(&self) -> ActuatorResult<()> {
        if self.tick.is_zero() {
            return Err(ActuatorError::Validation(
                "simulation tick must be non-zero".into(),
            ));
        }
        if !(self.step_size > 0.0 && self.step_size <= 100.0) {
            return Err(ActuatorError::Validation(format!(
                "simulation step size {} outside (0, 100]",
                self.step_size
            )));
        }
        let mut seen = BTreeSet::new();
        for slave in &self.slaves {
            if !seen.insert(slave.address) {
                return Err(ActuatorError::Validation(format!(
                    "simulated slave address {} listed twice",
                    slave.address
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            step_size: 2.0,
            seed: None,
            slaves: vec![SimulatedSlaveConfig {
                address: SlaveAddress::new(1).expect("1 is a valid slave address"),
                product: 1,
                name: None,
            }],
        }
    }
}

/// One simulated slave to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedSlaveConfig {
    /// Slave address (1–254).
    pub address: SlaveAddress,
    /// Product identifier from the catalog.
    pub product: u16,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Serial link parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Serial link parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Parity.
    pub parity: SerialParity,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Response timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyUSB0"),
            baud_rate: 9600,
            parity: SerialParity::None,
            stop_bits: 1,
            timeout: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval < MIN_POLL_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "polling interval {} is below the {} minimum",
                humantime::format_duration(self.polling.interval),
                humantime::format_duration(MIN_POLL_INTERVAL)
            )));
        }
        self.simulation.validate().map_err(|e| match e {
            ActuatorError::Validation(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        })?;
        if !matches!(self.serial.stop_bits, 1 | 2) {
            return Err(ConfigError::Invalid(format!(
                "stop bits must be 1 or 2, got {}",
                self.serial.stop_bits
            )));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values parsed but violate a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.mode, SessionMode::Simulation);
        assert_eq!(config.polling.interval, Duration::from_millis(500));
        assert_eq!(config.simulation.tick, Duration::from_millis(100));
        assert_eq!(config.simulation.slaves.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            mode = "hardware"

            [polling]
            interval = "250ms"

            [simulation]
            tick = "50ms"
            step_size = 5.0
            seed = 7

            [[simulation.slaves]]
            address = 3
            product = 2
            name = "Boiler feed"

            [serial]
            port = "COM4"
            baud_rate = 19200
            parity = "even"
            stop_bits = 2
            timeout = "750ms"
        "#;

        let config = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(config.mode, SessionMode::Hardware);
        assert_eq!(config.polling.interval, Duration::from_millis(250));
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.slaves[0].address.get(), 3);
        assert_eq!(config.simulation.slaves[0].name.as_deref(), Some("Boiler feed"));
        assert_eq!(config.serial.parity, SerialParity::Even);
        assert_eq!(config.serial.timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_poll_interval_floor() {
        let toml = r#"
            [polling]
            interval = "50ms"
        "#;
        let err = SessionConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("polling interval")));
    }

    #[test]
    fn test_duplicate_slave_rejected() {
        let toml = r#"
            [[simulation.slaves]]
            address = 4
            product = 1

            [[simulation.slaves]]
            address = 4
            product = 2
        "#;
        assert!(matches!(
            SessionConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_simulation_step_and_tick_checked() {
        for step_size in [0.0, -1.0, 100.5, f32::NAN] {
            let config = SimulationConfig {
                step_size,
                ..SimulationConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ActuatorError::Validation(msg)) if msg.contains("step size")),
                "step size {step_size} accepted"
            );
        }

        let zero_tick = SimulationConfig {
            tick: Duration::ZERO,
            ..SimulationConfig::default()
        };
        assert!(matches!(zero_tick.validate(), Err(ActuatorError::Validation(_))));

        let err = SessionConfig::from_toml("[simulation]\nstep_size = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("step size")));
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_slave_address_is_parse_error() {
        let toml = r#"
            [[simulation.slaves]]
            address = 0
            product = 1
        "#;
        assert!(matches!(
            SessionConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = SessionConfig::default();
        let toml = config.to_toml().unwrap();
        let parsed = SessionConfig::from_toml(&toml).unwrap();
        assert_eq!(config.polling.interval, parsed.polling.interval);
        assert_eq!(config.simulation.slaves, parsed.simulation.slaves);
        assert_eq!(config.serial, parsed.serial);
    }
}
