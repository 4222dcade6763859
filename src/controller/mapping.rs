//! # Channel Mapping Table
//!
//! Binds controller input sources to RC channels.
//!
//! Sources are written in configuration files as `axis_N`, `button_N`,
//! `hat_N_x` and `hat_N_y`; in code they are the [`InputSource`] variants.
//!
//! A [`MappingTable`] is treated as an immutable value once handed to the
//! link: editors clone it, change the copy and publish the new table whole.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crsf::protocol::CRSF_NUM_CHANNELS;

/// One axis of a hat switch (D-pad)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HatAxis {
    X,
    Y,
}

/// A raw controller input that can drive a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputSource {
    /// Analog axis by index, -1.0..=1.0
    Axis(usize),
    /// Digital button by index
    Button(usize),
    /// One axis of a hat switch by hat index, -1/0/1
    HatAxis(usize, HatAxis),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Axis(i) => write!(f, "axis_{}", i),
            InputSource::Button(i) => write!(f, "button_{}", i),
            InputSource::HatAxis(i, HatAxis::X) => write!(f, "hat_{}_x", i),
            InputSource::HatAxis(i, HatAxis::Y) => write!(f, "hat_{}_y", i),
        }
    }
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid input source '{}'", s);
        let key = s.trim().to_ascii_lowercase();

        if let Some(index) = key.strip_prefix("axis_") {
            return index.parse().map(InputSource::Axis).map_err(|_| invalid());
        }

        if let Some(index) = key.strip_prefix("button_") {
            return index.parse().map(InputSource::Button).map_err(|_| invalid());
        }

        if let Some(rest) = key.strip_prefix("hat_") {
            let (index, axis) = rest.rsplit_once('_').ok_or_else(invalid)?;
            let axis = match axis {
                "x" => HatAxis::X,
                "y" => HatAxis::Y,
                _ => return Err(invalid()),
            };
            let index = index.parse().map_err(|_| invalid())?;
            return Ok(InputSource::HatAxis(index, axis));
        }

        Err(invalid())
    }
}

/// Target channel (1-based) and inversion for one input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    pub channel: u8,

    #[serde(default)]
    pub invert: bool,
}

impl ChannelMapping {
    pub fn new(channel: u8, invert: bool) -> Self {
        Self { channel, invert }
    }

    /// Whether `channel` is one of the 16 RC channels.
    pub fn is_valid(&self) -> bool {
        (1..=CRSF_NUM_CHANNELS).contains(&(self.channel as usize))
    }
}

/// All active mappings, partitioned by input kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    axes: BTreeMap<usize, ChannelMapping>,
    buttons: BTreeMap<usize, ChannelMapping>,
    hats: BTreeMap<(usize, HatAxis), ChannelMapping>,
}

impl MappingTable {
    /// Creates an empty table: every channel stays neutral.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the mapping for `source`.
    pub fn insert(&mut self, source: InputSource, mapping: ChannelMapping) -> Option<ChannelMapping> {
        match source {
            InputSource::Axis(i) => self.axes.insert(i, mapping),
            InputSource::Button(i) => self.buttons.insert(i, mapping),
            InputSource::HatAxis(i, axis) => self.hats.insert((i, axis), mapping),
        }
    }

    pub fn remove(&mut self, source: InputSource) -> Option<ChannelMapping> {
        match source {
            InputSource::Axis(i) => self.axes.remove(&i),
            InputSource::Button(i) => self.buttons.remove(&i),
            InputSource::HatAxis(i, axis) => self.hats.remove(&(i, axis)),
        }
    }

    pub fn get(&self, source: InputSource) -> Option<&ChannelMapping> {
        match source {
            InputSource::Axis(i) => self.axes.get(&i),
            InputSource::Button(i) => self.buttons.get(&i),
            InputSource::HatAxis(i, axis) => self.hats.get(&(i, axis)),
        }
    }

    /// Routes `source` to `channel`, releasing any other source that held
    /// that channel. The new mapping starts non-inverted.
    pub fn assign(&mut self, source: InputSource, channel: u8) {
        self.axes.retain(|_, m| m.channel != channel);
        self.buttons.retain(|_, m| m.channel != channel);
        self.hats.retain(|_, m| m.channel != channel);
        self.insert(source, ChannelMapping::new(channel, false));
    }

    /// Flips the invert flag of an existing mapping.
    ///
    /// Returns the new flag, or `None` if `source` is unmapped.
    pub fn toggle_invert(&mut self, source: InputSource) -> Option<bool> {
        let mapping = match source {
            InputSource::Axis(i) => self.axes.get_mut(&i),
            InputSource::Button(i) => self.buttons.get_mut(&i),
            InputSource::HatAxis(i, axis) => self.hats.get_mut(&(i, axis)),
        }?;
        mapping.invert = !mapping.invert;
        Some(mapping.invert)
    }

    /// Channels claimed by at least one source.
    pub fn mapped_channels(&self) -> BTreeSet<u8> {
        self.iter().map(|(_, m)| m.channel).collect()
    }

    /// The source currently driving `channel`, if any.
    pub fn mapping_for_channel(&self, channel: u8) -> Option<(InputSource, ChannelMapping)> {
        self.iter().find(|(_, m)| m.channel == channel)
    }

    /// Every mapping in application order: axes, buttons, hat X axes, hat Y
    /// axes. When two sources claim one channel, the later one wins.
    pub fn iter(&self) -> impl Iterator<Item = (InputSource, ChannelMapping)> + '_ {
        let axes = self.axes.iter().map(|(&i, &m)| (InputSource::Axis(i), m));
        let buttons = self.buttons.iter().map(|(&i, &m)| (InputSource::Button(i), m));
        let hats_x = self
            .hats
            .iter()
            .filter(|((_, axis), _)| *axis == HatAxis::X)
            .map(|(&(i, axis), &m)| (InputSource::HatAxis(i, axis), m));
        let hats_y = self
            .hats
            .iter()
            .filter(|((_, axis), _)| *axis == HatAxis::Y)
            .map(|(&(i, axis), &m)| (InputSource::HatAxis(i, axis), m));

        axes.chain(buttons).chain(hats_x).chain(hats_y)
    }

    pub fn len(&self) -> usize {
        self.axes.len() + self.buttons.len() + self.hats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_sources() {
        assert_eq!("axis_0".parse::<InputSource>(), Ok(InputSource::Axis(0)));
        assert_eq!("button_12".parse::<InputSource>(), Ok(InputSource::Button(12)));
        assert_eq!("hat_1_x".parse::<InputSource>(), Ok(InputSource::HatAxis(1, HatAxis::X)));
        assert_eq!("HAT_0_Y".parse::<InputSource>(), Ok(InputSource::HatAxis(0, HatAxis::Y)));
    }

    #[test]
    fn test_parse_invalid_sources() {
        for key in ["", "axis_", "axis_x", "button", "hat_0", "hat_0_z", "hat_a_x", "stick_0"] {
            assert!(key.parse::<InputSource>().is_err(), "'{}' should not parse", key);
        }
    }

    #[test]
    fn test_display_round_trips() {
        let sources = [
            InputSource::Axis(3),
            InputSource::Button(0),
            InputSource::HatAxis(2, HatAxis::X),
            InputSource::HatAxis(0, HatAxis::Y),
        ];
        for source in sources {
            assert_eq!(source.to_string().parse::<InputSource>(), Ok(source));
        }
    }

    #[test]
    fn test_channel_mapping_validity() {
        assert!(ChannelMapping::new(1, false).is_valid());
        assert!(ChannelMapping::new(16, true).is_valid());
        assert!(!ChannelMapping::new(0, false).is_valid());
        assert!(!ChannelMapping::new(17, false).is_valid());
    }

    #[test]
    fn test_insert_get_remove() {
        let mut table = MappingTable::new();
        assert!(table.is_empty());

        table.insert(InputSource::Axis(0), ChannelMapping::new(1, false));
        table.insert(InputSource::HatAxis(0, HatAxis::Y), ChannelMapping::new(6, true));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(InputSource::Axis(0)), Some(&ChannelMapping::new(1, false)));
        assert_eq!(table.get(InputSource::HatAxis(0, HatAxis::X)), None);

        assert!(table.remove(InputSource::Axis(0)).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_assign_releases_previous_owner() {
        let mut table = MappingTable::new();
        table.insert(InputSource::Axis(0), ChannelMapping::new(3, true));
        table.insert(InputSource::Button(1), ChannelMapping::new(5, false));

        table.assign(InputSource::Button(2), 3);

        assert_eq!(table.get(InputSource::Axis(0)), None, "old owner of channel 3 removed");
        assert_eq!(table.get(InputSource::Button(2)), Some(&ChannelMapping::new(3, false)));
        assert_eq!(table.get(InputSource::Button(1)), Some(&ChannelMapping::new(5, false)));
        assert_eq!(table.mapped_channels().into_iter().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn test_toggle_invert() {
        let mut table = MappingTable::new();
        table.assign(InputSource::HatAxis(0, HatAxis::X), 7);

        assert_eq!(table.toggle_invert(InputSource::HatAxis(0, HatAxis::X)), Some(true));
        assert_eq!(table.toggle_invert(InputSource::HatAxis(0, HatAxis::X)), Some(false));
        assert_eq!(table.toggle_invert(InputSource::Axis(9)), None);
    }

    #[test]
    fn test_mapping_for_channel() {
        let mut table = MappingTable::new();
        table.assign(InputSource::Button(4), 8);

        assert_eq!(
            table.mapping_for_channel(8),
            Some((InputSource::Button(4), ChannelMapping::new(8, false)))
        );
        assert_eq!(table.mapping_for_channel(9), None);
    }

    #[test]
    fn test_iteration_order() {
        let mut table = MappingTable::new();
        table.insert(InputSource::HatAxis(1, HatAxis::Y), ChannelMapping::new(1, false));
        table.insert(InputSource::HatAxis(0, HatAxis::Y), ChannelMapping::new(2, false));
        table.insert(InputSource::HatAxis(1, HatAxis::X), ChannelMapping::new(3, false));
        table.insert(InputSource::Button(0), ChannelMapping::new(4, false));
        table.insert(InputSource::Axis(2), ChannelMapping::new(5, false));

        let order: Vec<InputSource> = table.iter().map(|(source, _)| source).collect();
        assert_eq!(
            order,
            vec![
                InputSource::Axis(2),
                InputSource::Button(0),
                InputSource::HatAxis(1, HatAxis::X),
                InputSource::HatAxis(0, HatAxis::Y),
                InputSource::HatAxis(1, HatAxis::Y),
            ]
        );
    }
}
