//! Acceptance tests for the actuator toolkit.
//!
//! These tests drive whole sessions the way an operator would:
//! - Motion and torque behavior of simulated actuators
//! - Register packing and saved configuration documents
//! - Session failure handling and mode switching
//!
//! Everything runs against the simulated network or an in-process serial
//! link, so no hardware or privileges are needed.

mod acceptance;
