//! Product catalog keyed by the product identifier register.

use crate::codec::DeviceConfiguration;
use crate::flags::{Actuation, FailsafeAction, SeatMode};
use crate::status::RawScale;
use actuator_common::error::{ActuatorError, ActuatorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mechanical actuator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Quarter-turn or multi-turn rotary output.
    Rotary,
    /// Linear thrust output.
    Linear,
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotary => write!(f, "rotary"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// Catalog entry for one product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    /// Value of the product identifier register.
    pub id: u16,
    /// Model designation.
    pub model: &'static str,
    /// Descriptive name.
    pub name: &'static str,
    /// Mechanical type.
    pub kind: ActuatorKind,
    /// Raw convention of the position/torque registers.
    pub raw_scale: RawScale,
}

const CATALOG: &[Product] = &[
    Product {
        id: 1,
        model: "RQ-50",
        name: "Rotary quarter-turn, double acting",
        kind: ActuatorKind::Rotary,
        raw_scale: RawScale::Permille,
    },
    Product {
        id: 2,
        model: "RQ-50SR",
        name: "Rotary quarter-turn, spring return",
        kind: ActuatorKind::Rotary,
        raw_scale: RawScale::Permille,
    },
    Product {
        id: 3,
        model: "LT-200",
        name: "Linear thrust",
        kind: ActuatorKind::Linear,
        raw_scale: RawScale::Counts12Bit,
    },
];

impl Product {
    /// All known products.
    #[must_use]
    pub fn catalog() -> &'static [Product] {
        CATALOG
    }

    /// Look up a known product.
    pub fn lookup(id: u16) -> ActuatorResult<Product> {
        CATALOG
            .iter()
            .find(|p| p.id == id)
            .copied()
            .ok_or_else(|| ActuatorError::Validation(format!("unknown product identifier {id}")))
    }

    /// Look up a product reported by a device, falling back to a generic
    /// entry so an unrecognised device can still be monitored.
    #[must_use]
    pub fn resolve(id: u16) -> Product {
        Self::lookup(id).unwrap_or(Product {
            id,
            model: "unknown",
            name: "Unrecognised actuator",
            kind: ActuatorKind::Rotary,
            raw_scale: RawScale::Permille,
        })
    }

    /// Factory configuration for this product.
    #[must_use]
    pub fn default_configuration(&self) -> DeviceConfiguration {
        let mut config = DeviceConfiguration {
            torque_limit: 80,
            speed_setting: 50,
            ..DeviceConfiguration::default()
        };
        match self.id {
            2 => {
                config.function.actuation = Actuation::SpringReturn;
                config.esd_action = FailsafeAction::Close;
            }
            3 => {
                config.function.close_seat = SeatMode::Torque;
                config.torque_limit = 90;
                config.speed_setting = 40;
            }
            _ => {}
        }
        config
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.model, self.name, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(Product::lookup(3).unwrap().kind, ActuatorKind::Linear);
        assert!(matches!(
            Product::lookup(42),
            Err(ActuatorError::Validation(_))
        ));
        assert_eq!(Product::resolve(42).model, "unknown");
        assert_eq!(Product::resolve(42).id, 42);
    }

    #[test]
    fn test_defaults_differ_by_product() {
        let spring = Product::lookup(2).unwrap().default_configuration();
        assert_eq!(spring.function.actuation, Actuation::SpringReturn);
        assert_eq!(spring.esd_action, FailsafeAction::Close);

        let linear = Product::lookup(3).unwrap();
        assert_eq!(linear.raw_scale, RawScale::Counts12Bit);
        assert_eq!(linear.default_configuration().speed_setting, 40);
    }

    #[test]
    fn test_catalog_defaults_are_valid() {
        for product in Product::catalog() {
            product.default_configuration().validate().unwrap();
        }
    }
}
