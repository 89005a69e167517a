use thiserror::Error;

/// Actuator error types covering transport, device, and caller-supplied parameters.
///
/// The first three variants map to distinct corrective actions for an operator:
/// connect first, check the slave address, check the wiring.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActuatorError {
    /// Operation attempted with no active transport.
    #[error("not connected: open a connection before talking to devices")]
    NotConnected,

    /// Unknown slave address.
    #[error("device not found: no slave at address {slave}")]
    NotFound {
        /// Slave address that was not found.
        slave: u8,
    },

    /// Underlying transport read/write failed or timed out.
    #[error("communication failed: {0}")]
    Communication(String),

    /// Register address or decoded value outside its declared bounds.
    #[error("{what} {value} out of range (valid: {min}..={max})")]
    OutOfRange {
        /// What was out of range (e.g. "register address").
        what: String,
        /// Offending value.
        value: u32,
        /// Lowest accepted value.
        min: u32,
        /// Highest accepted value.
        max: u32,
    },

    /// Caller-supplied parameter rejected.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ActuatorError {
    /// Shorthand for an [`ActuatorError::OutOfRange`] value.
    pub fn out_of_range(what: impl Into<String>, value: u32, min: u32, max: u32) -> Self {
        Self::OutOfRange {
            what: what.into(),
            value,
            min,
            max,
        }
    }

    /// Returns true if the error came from the link rather than the caller.
    #[must_use]
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

/// Convenience type alias for actuator operations.
pub type ActuatorResult<T> = Result<T, ActuatorError>;
