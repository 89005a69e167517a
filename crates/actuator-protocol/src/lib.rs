//! Actuator register protocol.
//!
//! This crate defines what each register and coil of an actuator means:
//! - [`register_map`] with the address layout and command coils
//! - [`flags`] with the tagged field types
//! - [`codec`] encoding and decoding the configuration block
//! - [`status`] decoding the status block into an [`ActuatorStatus`]
//! - [`product`] with the product catalog
//! - [`document`] with the saved-configuration schema
//!
//! Everything here is pure data transformation; nothing performs I/O
//! except the document load/save helpers.

pub mod codec;
pub mod document;
pub mod flags;
pub mod product;
pub mod register_map;
pub mod status;

pub use codec::{decode, encode, validate_registers, DeviceConfiguration};
pub use document::{ConfigurationDocument, DeviceRecord, DocumentError};
pub use product::{ActuatorKind, Product};
pub use register_map::CommandKind;
pub use status::{ActuatorState, ActuatorStatus, Alarms, Direction, RawScale, StatusDecoder};
