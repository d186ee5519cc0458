//! Hourly telemetry reporter for battery-powered field devices.
//!
//! The device uploads one reading per hour inside a daily operating window
//! and powers down between windows. The scheduling logic lives in
//! [`duty_cycle`]; the remaining modules provide the collaborators it is
//! composed with (clock, retained marker, network, sender, power control).

pub mod clock;
pub mod config;
pub mod daemon;
pub mod duty_cycle;
pub mod error;
pub mod marker;
pub mod network;
pub mod power;
pub mod telemetry;
pub mod tracing;
