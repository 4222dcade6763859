//! # RC Channel Mapper Module
//!
//! Maps raw controller input to CRSF RC channel values through a
//! [`MappingTable`].
//!
//! ## Value Ranges
//!
//! | Stage | Range | Neutral |
//! |-------|-------|---------|
//! | Axis input | -1.0..=1.0 | 0.0 |
//! | Hat input | -1, 0, 1 | 0 |
//! | Pulse width | 1000-2000 µs | 1500 µs |
//! | CRSF output | 0-2047 (11-bit) | 1024 |
//!
//! Each mapped source is converted to microseconds, optionally inverted
//! around 1500 µs, written to its channel, and finally every channel is
//! clamped to 1000-2000 µs before conversion to the CRSF range.
//!
//! ## Usage
//!
//! ```
//! use crsf_bridge::controller::channel_mapper::map_to_channels;
//! use crsf_bridge::controller::input::RawInput;
//! use crsf_bridge::controller::mapping::{ChannelMapping, InputSource, MappingTable};
//!
//! let mut table = MappingTable::new();
//! table.insert(InputSource::Button(0), ChannelMapping::new(5, false));
//!
//! let input = RawInput { buttons: vec![true], ..RawInput::default() };
//! let channels = map_to_channels(&input, &table);
//!
//! assert_eq!(channels[4], 2047); // pressed
//! assert_eq!(channels[0], 1024); // unmapped, neutral
//! ```

use super::input::RawInput;
use super::mapping::{ChannelMapping, InputSource, MappingTable};
use crate::crsf::protocol::{RcChannels, CRSF_CHANNEL_VALUE_MAX, CRSF_NUM_CHANNELS};

/// Lowest pulse width in microseconds
pub const US_MIN: i32 = 1000;

/// Neutral pulse width in microseconds
pub const US_CENTER: i32 = 1500;

/// Highest pulse width in microseconds
pub const US_MAX: i32 = 2000;

/// Pulse width for a released button
pub const SWITCH_OFF_US: i32 = US_MIN;

/// Pulse width for a pressed button
pub const SWITCH_ON_US: i32 = US_MAX;

/// Half the pulse range, the deflection of a full axis
const US_HALF_RANGE: f32 = 500.0;

/// Pulse width for the current value of one input source.
pub fn source_to_us(input: &RawInput, source: InputSource) -> i32 {
    match source {
        // Truncates toward zero
        InputSource::Axis(i) => (US_CENTER as f32 + input.axis(i) * US_HALF_RANGE) as i32,
        InputSource::Button(i) => {
            if input.button(i) {
                SWITCH_ON_US
            } else {
                SWITCH_OFF_US
            }
        }
        InputSource::HatAxis(i, axis) => US_CENTER + i32::from(input.hat(i, axis)) * 500,
    }
}

/// Reflects a pulse width about the neutral point.
#[inline]
pub fn invert_us(value: i32) -> i32 {
    2 * US_CENTER - value
}

/// Converts a pulse width to the CRSF range, clamping to 1000-2000 µs first.
///
/// `round((µs - 1000) * 2047 / 1000)`, halves rounding up.
#[inline]
pub fn us_to_crsf(value: i32) -> u16 {
    let clamped = value.clamp(US_MIN, US_MAX);
    let span = (US_MAX - US_MIN) as u32;
    let scaled = ((clamped - US_MIN) as u32 * CRSF_CHANNEL_VALUE_MAX as u32 + span / 2) / span;

    scaled as u16
}

/// Maps controller input to 16 pulse widths, clamped to 1000-2000 µs.
///
/// Unmapped channels and mappings naming a channel outside 1-16 leave the
/// channel at 1500 µs.
pub fn map_to_us(input: &RawInput, table: &MappingTable) -> [i32; CRSF_NUM_CHANNELS] {
    let mut channels = [US_CENTER; CRSF_NUM_CHANNELS];

    for (source, ChannelMapping { channel, invert }) in table.iter() {
        let Some(slot) = (channel as usize)
            .checked_sub(1)
            .and_then(|index| channels.get_mut(index))
        else {
            continue;
        };

        let value = source_to_us(input, source);
        *slot = if invert { invert_us(value) } else { value };
    }

    for value in channels.iter_mut() {
        *value = (*value).clamp(US_MIN, US_MAX);
    }

    channels
}

/// Maps controller input to 16 CRSF channel values (0-2047).
pub fn map_to_channels(input: &RawInput, table: &MappingTable) -> RcChannels {
    map_to_us(input, table).map(us_to_crsf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mapping::HatAxis;
    use crate::crsf::protocol::{CRSF_CHANNEL_VALUE_CENTER, CRSF_CHANNEL_VALUE_MIN};

    fn table(entries: &[(InputSource, u8, bool)]) -> MappingTable {
        let mut table = MappingTable::new();
        for &(source, channel, invert) in entries {
            table.insert(source, ChannelMapping::new(channel, invert));
        }
        table
    }

    // ==================== Conversion Tests ====================

    #[test]
    fn test_us_to_crsf_endpoints() {
        assert_eq!(us_to_crsf(US_MIN), CRSF_CHANNEL_VALUE_MIN);
        assert_eq!(us_to_crsf(US_MAX), CRSF_CHANNEL_VALUE_MAX);
    }

    #[test]
    fn test_us_to_crsf_neutral() {
        // (1500 - 1000) * 2047 / 1000 = 1023.5
        assert_eq!(us_to_crsf(US_CENTER), CRSF_CHANNEL_VALUE_CENTER);
    }

    #[test]
    fn test_us_to_crsf_rounds() {
        // 1001 µs -> 2.047, 1250 µs -> 511.75
        assert_eq!(us_to_crsf(1001), 2);
        assert_eq!(us_to_crsf(1250), 512);
    }

    #[test]
    fn test_us_to_crsf_clamps() {
        assert_eq!(us_to_crsf(0), CRSF_CHANNEL_VALUE_MIN);
        assert_eq!(us_to_crsf(900), CRSF_CHANNEL_VALUE_MIN);
        assert_eq!(us_to_crsf(2600), CRSF_CHANNEL_VALUE_MAX);
    }

    #[test]
    fn test_invert_symmetry() {
        for value in US_MIN..=US_MAX {
            assert_eq!(invert_us(invert_us(value)), value);
        }
        assert_eq!(invert_us(US_MIN), US_MAX);
        assert_eq!(invert_us(US_CENTER), US_CENTER);
    }

    // ==================== Source Tests ====================

    #[test]
    fn test_axis_source() {
        let input = RawInput {
            axes: vec![-1.0, 0.0, 1.0, 0.5],
            ..RawInput::default()
        };
        assert_eq!(source_to_us(&input, InputSource::Axis(0)), 1000);
        assert_eq!(source_to_us(&input, InputSource::Axis(1)), 1500);
        assert_eq!(source_to_us(&input, InputSource::Axis(2)), 2000);
        assert_eq!(source_to_us(&input, InputSource::Axis(3)), 1750);
    }

    #[test]
    fn test_button_source() {
        let input = RawInput {
            buttons: vec![false, true],
            ..RawInput::default()
        };
        assert_eq!(source_to_us(&input, InputSource::Button(0)), SWITCH_OFF_US);
        assert_eq!(source_to_us(&input, InputSource::Button(1)), SWITCH_ON_US);
    }

    #[test]
    fn test_hat_source() {
        let input = RawInput {
            hats: vec![(-1, 1)],
            ..RawInput::default()
        };
        assert_eq!(source_to_us(&input, InputSource::HatAxis(0, HatAxis::X)), 1000);
        assert_eq!(source_to_us(&input, InputSource::HatAxis(0, HatAxis::Y)), 2000);
    }

    // ==================== Mapping Tests ====================

    #[test]
    fn test_empty_table_is_neutral() {
        let channels = map_to_channels(&RawInput::default(), &MappingTable::new());
        assert_eq!(channels, [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS]);
    }

    #[test]
    fn test_neutral_scenario_round_trips_through_encoder() {
        use crate::crsf::encoder::{encode_rc_channels_frame, unpack_channels};

        let channels = map_to_channels(&RawInput::default(), &MappingTable::new());
        let frame = encode_rc_channels_frame(&channels).unwrap();

        assert_eq!(unpack_channels(&frame[3..25]).unwrap(), channels);
    }

    #[test]
    fn test_axis_mapping_to_channel() {
        let table = table(&[(InputSource::Axis(0), 1, false), (InputSource::Axis(1), 3, false)]);
        let input = RawInput {
            axes: vec![1.0, -1.0],
            ..RawInput::default()
        };

        let channels = map_to_channels(&input, &table);
        assert_eq!(channels[0], CRSF_CHANNEL_VALUE_MAX);
        assert_eq!(channels[2], CRSF_CHANNEL_VALUE_MIN);
        assert_eq!(channels[1], CRSF_CHANNEL_VALUE_CENTER);
    }

    #[test]
    fn test_inverted_button_swaps_extremes() {
        let table = table(&[(InputSource::Button(0), 5, true)]);

        let released = map_to_us(&RawInput::default(), &table);
        assert_eq!(released[4], US_MAX);

        let pressed = map_to_us(
            &RawInput {
                buttons: vec![true],
                ..RawInput::default()
            },
            &table,
        );
        assert_eq!(pressed[4], US_MIN);
    }

    #[test]
    fn test_inverted_axis() {
        let table = table(&[(InputSource::Axis(0), 2, true)]);
        let input = RawInput {
            axes: vec![0.5],
            ..RawInput::default()
        };

        assert_eq!(map_to_us(&input, &table)[1], 1250);
    }

    #[test]
    fn test_inverted_hat() {
        let table = table(&[(InputSource::HatAxis(0, HatAxis::X), 9, true)]);
        let input = RawInput {
            hats: vec![(1, 0)],
            ..RawInput::default()
        };

        assert_eq!(map_to_us(&input, &table)[8], US_MIN);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        let table = table(&[
            (InputSource::Axis(0), 1, false),
            (InputSource::Axis(1), 2, true),
        ]);
        let input = RawInput {
            axes: vec![3.0, 3.0],
            ..RawInput::default()
        };

        let us = map_to_us(&input, &table);
        assert_eq!(us[0], US_MAX);
        assert_eq!(us[1], US_MIN);
        assert!(us.iter().all(|v| (US_MIN..=US_MAX).contains(v)));
    }

    #[test]
    fn test_invalid_channel_numbers_are_skipped() {
        let table = table(&[(InputSource::Button(0), 0, false), (InputSource::Button(1), 17, false)]);
        let input = RawInput {
            buttons: vec![true, true],
            ..RawInput::default()
        };

        assert_eq!(map_to_us(&input, &table), [US_CENTER; CRSF_NUM_CHANNELS]);
    }

    #[test]
    fn test_later_kind_wins_on_shared_channel() {
        // Axes are applied before buttons
        let table = table(&[(InputSource::Axis(0), 4, false), (InputSource::Button(0), 4, false)]);
        let input = RawInput {
            axes: vec![1.0],
            buttons: vec![false],
            ..RawInput::default()
        };

        assert_eq!(map_to_us(&input, &table)[3], SWITCH_OFF_US);
    }

    #[test]
    fn test_missing_device_inputs_read_as_rest() {
        let table = table(&[
            (InputSource::Axis(5), 1, false),
            (InputSource::Button(9), 2, false),
            (InputSource::HatAxis(3, HatAxis::Y), 3, false),
        ]);

        let us = map_to_us(&RawInput::default(), &table);
        assert_eq!(us[0], US_CENTER);
        assert_eq!(us[1], SWITCH_OFF_US);
        assert_eq!(us[2], US_CENTER);
    }
}
