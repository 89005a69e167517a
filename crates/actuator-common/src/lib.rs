#![doc = "Common types shared across the actuator workspace."]

pub mod address;
pub mod config;
pub mod error;

pub use address::*;
pub use config::*;
pub use error::*;
