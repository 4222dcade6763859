//! # CRSF Bridge Library
//!
//! Fly a CRSF (Crossfire / ExpressLRS) radio link from a desktop joystick.
//!
//! This library provides the core functionality for turning joystick input
//! into a continuous stream of CRSF RC channel frames on a serial port, and
//! for decoding the telemetry the transmitter module sends back.

pub mod config;
pub mod error;
pub mod crsf;
pub mod controller;
pub mod serial;
pub mod session;
pub mod telemetry;
