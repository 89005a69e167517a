//! Slave addressing on a shared actuator bus.

use crate::error::{ActuatorError, ActuatorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated slave address in the protocol-legal range 1–254.
///
/// Address 0 is the broadcast address and 255 is reserved, so neither
/// can identify a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    /// Lowest assignable address.
    pub const MIN: u8 = 1;
    /// Highest assignable address.
    pub const MAX: u8 = 254;

    /// Create a slave address, rejecting values outside 1–254.
    pub fn new(address: u8) -> ActuatorResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&address) {
            Ok(Self(address))
        } else {
            Err(ActuatorError::Validation(format!(
                "slave address {address} outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Raw address byte.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Iterate over every assignable address.
    pub fn all() -> impl Iterator<Item = SlaveAddress> {
        (Self::MIN..=Self::MAX).map(SlaveAddress)
    }
}

impl TryFrom<u8> for SlaveAddress {
    type Error = ActuatorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlaveAddress> for u8 {
    fn from(address: SlaveAddress) -> Self {
        address.0
    }
}

impl fmt::Display for SlaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(SlaveAddress::new(0).is_err());
        assert!(SlaveAddress::new(255).is_err());
        assert_eq!(SlaveAddress::new(1).unwrap().get(), 1);
        assert_eq!(SlaveAddress::new(254).unwrap().get(), 254);
        assert_eq!(SlaveAddress::all().count(), 254);
    }

    #[test]
    fn test_rejects_with_validation_error() {
        let err = SlaveAddress::new(0).unwrap_err();
        assert!(matches!(err, ActuatorError::Validation(_)));
    }

    #[test]
    fn test_serde_rejects_broadcast() {
        let ok: SlaveAddress = serde_json::from_str("12").unwrap();
        assert_eq!(ok.get(), 12);
        assert!(serde_json::from_str::<SlaveAddress>("0").is_err());
    }
}
