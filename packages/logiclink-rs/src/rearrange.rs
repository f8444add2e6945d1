//! Decode raw device transfers into per-channel sample streams.
//!
//! Due to hardware and signal integrity reasons the data coming from the
//! device is encoded in a way that depends on the speed and the number of
//! channels. For some settings only byte reordering is needed, for the
//! fastest transfers the bits inside every byte have to be reordered too.

use crate::error::{Error, Result};
use crate::params::{AcqParams, DigitalEncoding};
use crate::types::{Bytes, SampleData};

/// Per-channel bit transpose for the fast flexio settings.
///
/// Label a byte acquired by CH0 as B0 and a bit from the flexio pin of
/// channel 0 as b0[0], b1[0] and so on. With a single channel on 4 shift
/// buffers the data arrives as:
///
/// ```text
/// b0[0] b0[1] b0[2] ... b0[31]
/// b1[0] b1[1] b1[2] ... b1[31]
/// b2[0] b2[1] b2[2] ... b2[31]
/// b3[0] b3[1] b3[2] ... b3[31]
/// ```
///
/// and has to become:
///
/// ```text
/// b0[0]  b1[0]  b2[0]  b3[0]  b0[1]  b1[1]  b2[1]  b3[1]
/// ...
/// b0[30] b1[30] b2[30] b3[30] b0[31] b1[31] b2[31] b3[31]
/// ```
fn rearrange_flexio_bits(raw: &[u8], channels: usize, shiftbufs: usize) -> SampleData {
    let bytes_per_batch = 4 * shiftbufs;

    let mut digital: Vec<Bytes> = (0..channels)
        .map(|_| Bytes::with_capacity(raw.len() / channels))
        .collect();

    let mut channel = 0;
    for input in raw.chunks_exact(bytes_per_batch) {
        let out: &mut Bytes = &mut digital[channel];
        let base = out.len();
        out.resize(base + bytes_per_batch, 0);

        for k in 0..4 {
            for j in 0..8 {
                // Normalize every source bit to 0bX000'0000 using only a left
                // shift, then drop it on its destination position.
                for l in 0..shiftbufs {
                    let in_idx = 4 * (shiftbufs - l - 1) + 3 - k;
                    let sh = 8 - j - 1;
                    let n = input[in_idx] << sh;
                    let nibble = (j % (8 / shiftbufs)) * shiftbufs;

                    let out_idx = k * shiftbufs + j / (8 / shiftbufs);
                    out[base + out_idx] |= (n & 0b1000_0000) >> (l + nibble);
                }
            }
        }

        channel = (channel + 1) % channels;
    }

    SampleData {
        digital,
        analog: Vec::new(),
    }
}

/// Byte reordering only. The input interleaves one 32 bit word per channel:
/// CH0 4B, CH1 4B, ..., CHn 4B, CH0 4B and so on.
fn rearrange_flexio_bytes(raw: &[u8], channels: usize) -> SampleData {
    let mut digital: Vec<Bytes> = (0..channels)
        .map(|_| Bytes::with_capacity(raw.len() / channels))
        .collect();

    let mut channel = 0;
    for word in raw.chunks(4) {
        digital[channel].extend_from_slice(word);
        channel = (channel + 1) % channels;
    }

    SampleData {
        digital,
        analog: Vec::new(),
    }
}

fn rearrange_flexio(raw: &[u8], params: &AcqParams) -> Result<SampleData> {
    match params.digital_channels {
        1 => Ok(rearrange_flexio_bits(raw, 1, 4)),
        2 => Ok(rearrange_flexio_bits(raw, 2, 2)),
        4 => Ok(rearrange_flexio_bytes(raw, 4)),
        8 => Ok(rearrange_flexio_bytes(raw, 8)),
        n => Err(Error::UnsupportedChannels(n)),
    }
}

/// Decode a raw transfer according to the acquisition settings.
pub fn rearrange(raw: &[u8], params: &AcqParams) -> Result<SampleData> {
    if params.digital_channels > 0 {
        return match params.digital_encoding {
            DigitalEncoding::Flexio => rearrange_flexio(raw, params),
            // Not produced by the current firmware.
            DigitalEncoding::Gpio12 => Ok(SampleData::default()),
        };
    }

    Ok(SampleData::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Mode;

    fn params(channels: usize) -> AcqParams {
        AcqParams {
            digital_sample_rate: 1_000_000,
            digital_channels: channels,
            digital_encoding: DigitalEncoding::Flexio,
            mode: Mode::Acquisition,
            ..AcqParams::default()
        }
    }

    #[test]
    fn eight_channels_byte_mode() {
        #[rustfmt::skip]
        let raw = vec![
            0x00, 0x01, 0x02, 0x03, // CH0 word 0
            0x10, 0x11, 0x12, 0x13, // CH1 word 0
            0x20, 0x21, 0x22, 0x23, // CH2 word 0
            0x30, 0x31, 0x32, 0x33, // CH3 word 0
            0x40, 0x41, 0x42, 0x43, // CH4 word 0
            0x50, 0x51, 0x52, 0x53, // CH5 word 0
            0x60, 0x61, 0x62, 0x63, // CH6 word 0
            0x70, 0x71, 0x72, 0x73, // CH7 word 0
            0x04, 0x05, 0x06, 0x07, // CH0 word 1
            0x14, 0x15, 0x16, 0x17, // CH1 word 1
            0x24, 0x25, 0x26, 0x27, // CH2 word 1
            0x34, 0x35, 0x36, 0x37, // CH3 word 1
            0x44, 0x45, 0x46, 0x47, // CH4 word 1
            0x54, 0x55, 0x56, 0x57, // CH5 word 1
            0x64, 0x65, 0x66, 0x67, // CH6 word 1
            0x74, 0x75, 0x76, 0x77, // CH7 word 1
        ];

        let sd = rearrange(&raw, &params(8)).unwrap();
        for ch in 0..8 {
            let base = (ch as u8) << 4;
            let expected: Bytes = (0..8).map(|i| base + i).collect();
            assert_eq!(sd.digital[ch], expected, "channel {ch}");
        }
    }

    #[test]
    fn four_channels_byte_mode() {
        let mut raw = Vec::new();
        for word in 0..4u8 {
            for ch in 0..4u8 {
                for b in 0..4u8 {
                    raw.push((ch << 4) + word * 4 + b);
                }
            }
        }

        let sd = rearrange(&raw, &params(4)).unwrap();
        for ch in 0..4 {
            let base = (ch as u8) << 4;
            let expected: Bytes = (0..16).map(|i| base + i).collect();
            assert_eq!(sd.digital[ch], expected, "channel {ch}");
        }
    }

    #[test]
    fn one_channel_four_shifters() {
        #[rustfmt::skip]
        let raw = vec![
            0b10001000, 0b10001000, 0b10001000, 0b10001000, // SHIFTBUF0
            0b10100000, 0b10100000, 0b10100000, 0b10100000, // SHIFTBUF1
            0b10101010, 0b00000000, 0b10101010, 0b00000000, // SHIFTBUF2
            0b10101010, 0b10101010, 0b00000000, 0b00000000, // SHIFTBUF3

            0b11011101, 0b11011101, 0b11011101, 0b11011101, // SHIFTBUF0
            0b10100000, 0b10100000, 0b10100000, 0b10100000, // SHIFTBUF1
            0b10101010, 0b00000000, 0b10101010, 0b00000000, // SHIFTBUF2
            0b10101010, 0b10101010, 0b00000000, 0b00000000, // SHIFTBUF3
        ];

        let sd = rearrange(&raw, &params(1)).unwrap();
        let expected: Bytes = (0..0x20).collect();
        assert_eq!(sd.digital[0], expected);
    }

    #[test]
    fn one_channel_squarewave() {
        #[rustfmt::skip]
        let raw = vec![
            0b00111001, 0b11001110, 0b01110011, 0b10011100, // SHIFTBUF0
            0b00111001, 0b11001110, 0b01110011, 0b10011100, // SHIFTBUF1
            0b00110001, 0b10001100, 0b01100011, 0b00011000, // SHIFTBUF2
            0b00110001, 0b10001100, 0b01100011, 0b00011000, // SHIFTBUF3

            0b11001110, 0b01110011, 0b10011100, 0b11100111, // SHIFTBUF0
            0b11001110, 0b01110011, 0b10011100, 0b11100111, // SHIFTBUF1
            0b10001100, 0b01100011, 0b00011000, 0b11000110, // SHIFTBUF2
            0b10001100, 0b01100011, 0b00011000, 0b11000110, // SHIFTBUF3
        ];

        let sd = rearrange(&raw, &params(1)).unwrap();

        #[rustfmt::skip]
        let expected = vec![
            0b00000000, 0b00111111, 0b11110000, 0b00000011, 0b11111111, 0b00000000, 0b00111111, 0b11110000,
            0b00000011, 0b11111111, 0b00000000, 0b00111111, 0b11110000, 0b00000011, 0b11111111, 0b00000000,
            0b00111111, 0b11110000, 0b00000011, 0b11111111, 0b00000000, 0b00111111, 0b11110000, 0b00000011,
            0b11111111, 0b00000000, 0b00111111, 0b11110000, 0b00000011, 0b11111111, 0b00000000, 0b00111111,
        ];
        assert_eq!(sd.digital[0], expected);
    }

    #[test]
    fn two_channels_two_shifters() {
        #[rustfmt::skip]
        let raw = vec![
            0b11000100, 0b11000100, 0b10000000, 0b10000000, // CH0 SHIFTBUF0
            0b10001000, 0b00000000, 0b10001000, 0b00000000, // CH0 SHIFTBUF1

            0b11100110, 0b11100110, 0b10100010, 0b10100010, // CH1 SHIFTBUF0
            0b10001000, 0b00000000, 0b10001000, 0b00000000, // CH1 SHIFTBUF1

            0b11000100, 0b11000100, 0b10000000, 0b10000000, // CH0 SHIFTBUF0
            0b11001100, 0b01000100, 0b11001100, 0b01000100, // CH0 SHIFTBUF1

            0b11100110, 0b11100110, 0b10100010, 0b10100010, // CH1 SHIFTBUF0
            0b11001100, 0b01000100, 0b11001100, 0b01000100, // CH1 SHIFTBUF1
        ];

        let sd = rearrange(&raw, &params(2)).unwrap();
        let ch0: Bytes = (0x00..0x10).collect();
        let ch1: Bytes = (0x10..0x20).collect();
        assert_eq!(sd.digital[0], ch0);
        assert_eq!(sd.digital[1], ch1);
    }

    #[test]
    fn odd_channel_count_is_rejected() {
        let raw = vec![0u8; 16];
        assert!(matches!(
            rearrange(&raw, &params(3)),
            Err(Error::UnsupportedChannels(3))
        ));
    }
}
