//! # Controller Module
//!
//! Joystick input and its translation into RC channels.
//!
//! This module handles:
//! - Joystick detection and event reading via evdev
//! - Raw input snapshots (axes, buttons, hats)
//! - The input-to-channel mapping table
//! - Mapping raw input to CRSF channel values

pub mod channel_mapper;
pub mod input;
pub mod joystick;
pub mod mapping;

pub use input::RawInput;
pub use mapping::{ChannelMapping, HatAxis, InputSource, MappingTable};
