//! # CRSF Packet Encoder
//!
//! Encodes RC channels into CRSF protocol packets.

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::{BridgeError, Result};

/// Encode RC channels into a complete CRSF frame
///
/// # Arguments
///
/// * `channels` - 16 channel values (11-bit: 0-2047)
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Complete CRSF frame (26 bytes: sync + length + type + 22-byte payload + crc)
///
/// # Errors
///
/// Returns `InvalidChannels` if `channels` does not hold exactly 16 values or
/// any value is above 2047.
///
/// # Examples
///
/// ```
/// use crsf_bridge::crsf::encoder::encode_rc_channels_frame;
///
/// let channels = [1024u16; 16]; // All channels at center
/// let frame = encode_rc_channels_frame(&channels).unwrap();
/// assert_eq!(frame.len(), 26);
/// ```
pub fn encode_rc_channels_frame(channels: &[u16]) -> Result<Vec<u8>> {
    let channels = validate_channels(channels)?;
    let packed = pack_channels(&channels);

    // Build frame: Sync + Length + Type + Payload
    let mut frame = Vec::with_capacity(CRSF_RC_CHANNELS_PAYLOAD_SIZE + 4);
    frame.push(CRSF_SYNC_BYTE);
    frame.push(CRSF_RC_CHANNELS_FRAME_LENGTH);
    frame.push(CRSF_FRAMETYPE_RC_CHANNELS_PACKED);
    frame.extend_from_slice(&packed);

    // CRC over Type + Payload
    let crc = crc8_dvb_s2(&frame[2..]);
    frame.push(crc);

    Ok(frame)
}

/// Check the channel count and the 11-bit range of every value.
fn validate_channels(channels: &[u16]) -> Result<RcChannels> {
    let channels: RcChannels = channels.try_into().map_err(|_| {
        BridgeError::InvalidChannels(format!(
            "expected {} channels, got {}",
            CRSF_NUM_CHANNELS,
            channels.len()
        ))
    })?;

    if let Some((index, value)) = channels
        .iter()
        .enumerate()
        .find(|(_, value)| **value > CRSF_CHANNEL_VALUE_MAX)
    {
        return Err(BridgeError::InvalidChannels(format!(
            "channel {} value {} exceeds {}",
            index + 1,
            value,
            CRSF_CHANNEL_VALUE_MAX
        )));
    }

    Ok(channels)
}

/// Pack 16 channels into the 22-byte payload
///
/// Channels are concatenated into one little-endian bit stream, 11 bits each,
/// LSB first. A byte is emitted as soon as 8 bits are buffered.
///
/// ```text
/// Byte 0: Ch1[0:7]
/// Byte 1: Ch1[8:10] | Ch2[0:4]
/// Byte 2: Ch2[5:10] | Ch3[0:1]
/// ...
/// ```
///
/// Bits above the 11th are masked off.
pub fn pack_channels(channels: &RcChannels) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut packed = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
    let mut out = 0;
    let mut bit_buffer: u32 = 0;
    let mut bits_in_buffer: u32 = 0;

    for &channel in channels.iter() {
        bit_buffer |= u32::from(channel & CRSF_CHANNEL_VALUE_MAX) << bits_in_buffer;
        bits_in_buffer += CRSF_CHANNEL_BITS;

        while bits_in_buffer >= 8 {
            packed[out] = (bit_buffer & 0xFF) as u8;
            out += 1;
            bit_buffer >>= 8;
            bits_in_buffer -= 8;
        }
    }

    // Partial trailing byte
    if bits_in_buffer > 0 && out < packed.len() {
        packed[out] = (bit_buffer & 0xFF) as u8;
    }

    packed
}

/// Unpack a 22-byte RC channels payload into 16 channel values
///
/// # Errors
///
/// Returns `CrsfProtocol` if the payload is shorter than 22 bytes.
pub fn unpack_channels(payload: &[u8]) -> Result<RcChannels> {
    if payload.len() < CRSF_RC_CHANNELS_PAYLOAD_SIZE {
        return Err(BridgeError::CrsfProtocol(format!(
            "RC channels payload too short: {} bytes",
            payload.len()
        )));
    }

    let mut channels = [0u16; CRSF_NUM_CHANNELS];
    let mut bytes = payload.iter();
    let mut bit_buffer: u32 = 0;
    let mut bits_in_buffer: u32 = 0;

    for channel in channels.iter_mut() {
        while bits_in_buffer < CRSF_CHANNEL_BITS {
            // Length checked above: 22 bytes cover all 176 bits
            let byte = bytes.next().copied().unwrap_or(0);
            bit_buffer |= u32::from(byte) << bits_in_buffer;
            bits_in_buffer += 8;
        }

        *channel = (bit_buffer & u32::from(CRSF_CHANNEL_VALUE_MAX)) as u16;
        bit_buffer >>= CRSF_CHANNEL_BITS;
        bits_in_buffer -= CRSF_CHANNEL_BITS;
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_rc_channels_frame_length() {
        let channels = [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS];
        let frame = encode_rc_channels_frame(&channels).unwrap();

        // Frame should be 26 bytes: sync(1) + length(1) + type(1) + payload(22) + crc(1)
        assert_eq!(frame.len(), 26);
    }

    #[test]
    fn test_encode_rc_channels_frame_structure() {
        let channels = [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS];
        let frame = encode_rc_channels_frame(&channels).unwrap();

        assert_eq!(frame[0], CRSF_SYNC_BYTE);
        assert_eq!(frame[1], CRSF_RC_CHANNELS_FRAME_LENGTH);
        assert_eq!(frame[2], CRSF_FRAMETYPE_RC_CHANNELS_PACKED);
        assert_eq!(frame[25], crc8_dvb_s2(&frame[2..25]), "CRC must cover type + payload");
    }

    #[test]
    fn test_encode_matches_frame_to_bytes() {
        let channels = [172u16, 992, 1811, 0, 2047, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        let frame = encode_rc_channels_frame(&channels).unwrap();
        let generic = CrsfFrame::new(
            CRSF_FRAMETYPE_RC_CHANNELS_PACKED,
            pack_channels(&channels).to_vec(),
        )
        .unwrap()
        .to_bytes();

        assert_eq!(frame, generic);
    }

    #[test]
    fn test_encode_rejects_wrong_channel_count() {
        let result = encode_rc_channels_frame(&[1024u16; 15]);
        assert!(matches!(result, Err(BridgeError::InvalidChannels(_))));

        let result = encode_rc_channels_frame(&[1024u16; 17]);
        assert!(matches!(result, Err(BridgeError::InvalidChannels(_))));

        let result = encode_rc_channels_frame(&[]);
        assert!(matches!(result, Err(BridgeError::InvalidChannels(_))));
    }

    #[test]
    fn test_encode_rejects_out_of_range_value() {
        let mut channels = [0u16; CRSF_NUM_CHANNELS];
        channels[3] = 2048;

        match encode_rc_channels_frame(&channels) {
            Err(BridgeError::InvalidChannels(msg)) => assert!(msg.contains("channel 4")),
            other => panic!("Expected InvalidChannels, got: {:?}", other),
        }
    }

    #[test]
    fn test_pack_all_zeros() {
        let payload = pack_channels(&[0u16; CRSF_NUM_CHANNELS]);
        assert_eq!(payload, [0u8; 22]);
    }

    #[test]
    fn test_pack_all_max() {
        // 16 channels × 11 bits = 176 bits = 22 bytes, all set
        let payload = pack_channels(&[CRSF_CHANNEL_VALUE_MAX; CRSF_NUM_CHANNELS]);
        assert_eq!(payload, [0xFFu8; 22]);
    }

    #[test]
    fn test_pack_single_channel() {
        let mut channels = [0u16; CRSF_NUM_CHANNELS];
        channels[0] = 0x7FF;

        let payload = pack_channels(&channels);

        // Byte 0: bits 0-7, byte 1: bits 8-10
        assert_eq!(payload[0], 0xFF);
        assert_eq!(payload[1], 0x07);
        assert!(payload[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pack_second_channel_offset() {
        let mut channels = [0u16; CRSF_NUM_CHANNELS];
        channels[1] = 0x7FF;

        let payload = pack_channels(&channels);

        // Ch2 occupies bits 11..22
        assert_eq!(payload[0], 0x00);
        assert_eq!(payload[1], 0xF8);
        assert_eq!(payload[2], 0x3F);
    }

    #[test]
    fn test_pack_masks_overflow_bits() {
        let mut channels = [0u16; CRSF_NUM_CHANNELS];
        channels[0] = 0xFFFF;

        let payload = pack_channels(&channels);

        // Only the low 11 bits survive, channel 2 stays zero
        assert_eq!(payload[0], 0xFF);
        assert_eq!(payload[1], 0x07);
        assert_eq!(unpack_channels(&payload).unwrap()[1], 0);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let vectors: [RcChannels; 3] = [
            [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS],
            core::array::from_fn(|i| (i as u16) * 136),
            core::array::from_fn(|i| if i % 2 == 0 { CRSF_CHANNEL_VALUE_MAX } else { 1 }),
        ];

        for channels in vectors {
            let payload = pack_channels(&channels);
            assert_eq!(unpack_channels(&payload).unwrap(), channels);
        }
    }

    #[test]
    fn test_every_value_on_every_channel_round_trips() {
        // Neighbours hold a distinct pattern so bleed across boundaries shows up
        let background: RcChannels = core::array::from_fn(|i| ((i as u16) * 613 + 97) & 0x7FF);

        for channel in 0..CRSF_NUM_CHANNELS {
            for value in CRSF_CHANNEL_VALUE_MIN..=CRSF_CHANNEL_VALUE_MAX {
                let mut channels = background;
                channels[channel] = value;

                let frame = encode_rc_channels_frame(&channels).unwrap();
                assert_eq!(
                    unpack_channels(&frame[3..25]).unwrap(),
                    channels,
                    "channel {} value {} did not survive packing",
                    channel + 1,
                    value
                );
            }
        }
    }

    #[test]
    fn test_unpack_too_short() {
        assert!(unpack_channels(&[0u8; 21]).is_err());
    }
}
