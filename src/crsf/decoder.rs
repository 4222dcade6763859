//! # CRSF Frame Decoder
//!
//! Turns a raw serial byte stream into validated CRSF frames.
//!
//! Reads from the serial port never line up with frame boundaries, so
//! [`FrameDecoder`] keeps the unconsumed tail between calls. Corruption is
//! handled by dropping a single byte and scanning again, which bounds the
//! loss to one byte per failed attempt and always makes progress.

use bytes::{Buf, BytesMut};
use tracing::trace;

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::{BridgeError, Result};

/// Largest length byte accepted from the wire; anything above is a false sync
pub const CRSF_MAX_LENGTH: u8 = CRSF_MAX_FRAME_SIZE as u8;

/// Minimum bytes needed before a frame header can be inspected:
/// sync(1) + length(1) + type(1) + crc(1)
const MIN_FRAME_BYTES: usize = 4;

/// Decode a complete CRSF frame
///
/// # Arguments
///
/// * `frame` - Complete CRSF frame bytes (including sync, length, type, payload, crc)
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short
/// - Sync byte is incorrect
/// - Length byte is out of range
/// - CRC check fails
pub fn decode_frame(frame: &[u8]) -> Result<CrsfFrame> {
    if frame.len() < MIN_FRAME_BYTES {
        return Err(BridgeError::CrsfProtocol(
            "Frame too short".to_string()
        ));
    }

    if frame[0] != CRSF_SYNC_BYTE {
        return Err(BridgeError::CrsfProtocol(
            format!("Invalid sync byte: 0x{:02X}", frame[0])
        ));
    }

    let length = frame[1];
    if !(CRSF_MIN_LENGTH..=CRSF_MAX_LENGTH).contains(&length) {
        return Err(BridgeError::CrsfProtocol(
            format!("Invalid length byte: {}", length)
        ));
    }

    // Frame is sync(1) + length(1) + [length bytes]
    // where [length bytes] = type(1) + payload(N) + crc(1)
    let total = 2 + length as usize;
    if frame.len() < total {
        return Err(BridgeError::CrsfProtocol(
            format!("Frame too short: expected {} bytes, got {}", total, frame.len())
        ));
    }

    let received_crc = frame[total - 1];

    // CRC covers Type + Payload
    let calculated_crc = crc8_dvb_s2(&frame[2..total - 1]);

    if calculated_crc != received_crc {
        return Err(BridgeError::CrsfProtocol(
            format!("CRC mismatch: expected 0x{:02X}, got 0x{:02X}", calculated_crc, received_crc)
        ));
    }

    // Received frames may carry up to 62 payload bytes, more than
    // `CrsfFrame::new` allows for outgoing ones
    Ok(CrsfFrame {
        frame_type: frame[2],
        payload: frame[3..total - 1].to_vec(),
    })
}

/// Running counters kept by a [`FrameDecoder`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed validation
    pub frames: u64,

    /// Bytes dropped while resynchronizing
    pub discarded_bytes: u64,

    /// Candidate frames rejected by the CRC check
    pub crc_errors: u64,
}

/// Streaming CRSF frame decoder
///
/// Scans an append-only buffer in one loop with two logical states:
/// seeking a sync byte, and waiting for the rest of a frame whose header has
/// been seen.
///
/// # Examples
///
/// ```
/// use crsf_bridge::crsf::decoder::FrameDecoder;
/// use crsf_bridge::crsf::encoder::encode_rc_channels_frame;
///
/// let frame = encode_rc_channels_frame(&[1024u16; 16]).unwrap();
/// let mut decoder = FrameDecoder::new();
///
/// // Split delivery: nothing until the second half arrives
/// assert!(decoder.decode(&frame[..10]).is_empty());
/// let frames = decoder.decode(&frame[10..]);
/// assert_eq!(frames.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes received from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extracts the next validated frame, if the buffer holds one.
    ///
    /// Returns `None` when more bytes are needed; the partial frame stays
    /// buffered for the next call.
    pub fn next_frame(&mut self) -> Option<CrsfFrame> {
        while self.buffer.len() >= MIN_FRAME_BYTES {
            if self.buffer[0] != CRSF_SYNC_BYTE {
                self.discard_one();
                continue;
            }

            let length = self.buffer[1];
            if !(CRSF_MIN_LENGTH..=CRSF_MAX_LENGTH).contains(&length) {
                // False sync
                trace!("Rejecting length byte {} after sync", length);
                self.discard_one();
                continue;
            }

            let total = 2 + length as usize;
            if self.buffer.len() < total {
                return None;
            }

            match decode_frame(&self.buffer[..total]) {
                Ok(frame) => {
                    self.buffer.advance(total);
                    self.stats.frames += 1;
                    return Some(frame);
                }
                Err(e) => {
                    trace!("Dropping sync byte: {}", e);
                    self.stats.crc_errors += 1;
                    self.discard_one();
                }
            }
        }

        None
    }

    /// Feeds `data` and returns every frame that became complete, in
    /// arrival order.
    pub fn decode(&mut self, data: &[u8]) -> Vec<CrsfFrame> {
        self.push(data);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drops buffered bytes, e.g. after the transport was re-opened.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn discard_one(&mut self) {
        self.buffer.advance(1);
        self.stats.discarded_bytes += 1;
    }
}
