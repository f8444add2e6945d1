//! Majority-vote bit downsampling used to build zoomed-out views.
//!
//! Input bits are consumed MSB first in groups of `zoom_out`. A group with
//! more set than clear bits produces 1, more clear than set produces 0, and
//! an exact tie produces the negation of the previously emitted bit. The tie
//! rule keeps pulse trains visible: a clock at exactly half the group rate
//! downsamples to an alternating pattern instead of a flat line.

use crate::types::Bytes;

/// Carry-over between consecutive [`downsample`] calls on one channel.
/// One instance per channel per zoom level.
#[derive(Debug, Default, Clone)]
pub struct DownsampleState {
    /// Last emitted output bit.
    last: bool,
    /// Bits consumed from the current input group.
    group_fill: usize,
    /// Set bits seen in the current input group.
    group_set: usize,
    /// Partially assembled output byte.
    out_byte: u8,
    /// Bits already placed in `out_byte`.
    out_fill: usize,
}

impl DownsampleState {
    fn emit(&mut self, zoom_out: usize, out: &mut Bytes) {
        let bit = match (2 * self.group_set).cmp(&zoom_out) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => !self.last,
        };

        self.last = bit;
        self.group_fill = 0;
        self.group_set = 0;

        self.out_byte |= (bit as u8) << (7 - self.out_fill);
        self.out_fill += 1;

        if self.out_fill == 8 {
            out.push(self.out_byte);
            self.out_byte = 0;
            self.out_fill = 0;
        }
    }
}

/// Reduces `input` by the factor `zoom_out`, continuing from `state`.
/// Only whole output bytes are returned; a trailing partial byte stays
/// in `state` until a later call completes it.
pub fn downsample(input: &[u8], zoom_out: usize, state: &mut DownsampleState) -> Bytes {
    debug_assert!(zoom_out > 1);

    let mut out = Bytes::with_capacity(input.len() / zoom_out + 1);

    for &byte in input {
        for bit in (0..8).rev() {
            state.group_set += usize::from(byte >> bit & 1);
            state.group_fill += 1;

            if state.group_fill == zoom_out {
                state.emit(zoom_out, &mut out);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &[u8], zoom_out: usize) -> Bytes {
        let mut state = DownsampleState::default();
        downsample(input, zoom_out, &mut state)
    }

    #[test]
    fn zoom_8() {
        assert_eq!(run(&[0x00; 8], 8), vec![0x00]);
        assert_eq!(
            run(&[0xaa, 0x11, 0xaa, 0x11, 0xaa, 0x11, 0xaa, 0x00], 8),
            vec![0xaa]
        );
    }

    #[test]
    fn zoom_16() {
        assert_eq!(run(&[0x00; 16], 16), vec![0x00]);
        assert_eq!(
            run(
                &[
                    0xaa, 0xaa, 0x11, 0x11, 0xaa, 0xaa, 0x11, 0x00, 0xaa, 0xaa, 0x11, 0x11, 0xaa,
                    0xaa, 0x11, 0x00
                ],
                16
            ),
            vec![0xaa]
        );
    }

    #[test]
    fn zoom_4() {
        assert_eq!(run(&[0x00; 4], 4), vec![0x00]);
        assert_eq!(
            run(&[0b11111111, 0b11111111, 0b00000000, 0b00000000], 4),
            vec![0xf0]
        );
        assert_eq!(
            run(&[0b11110000, 0b11110000, 0b11110000, 0b11110000], 4),
            vec![0xaa]
        );
    }

    #[test]
    fn zoom_2() {
        assert_eq!(run(&[0x00, 0x00], 2), vec![0x00]);
        assert_eq!(run(&[0b11111111, 0b00000000], 2), vec![0xf0]);
        assert_eq!(run(&[0b11001100, 0b11001100], 2), vec![0xaa]);
        assert_eq!(
            run(&[0b11001100, 0b11001100, 0b11111111, 0b00000000], 2),
            vec![0xaa, 0xf0]
        );
        assert_eq!(run(&[0b10101010, 0b10101010], 2), vec![0b10101010]);
    }

    #[test]
    fn state_spans_calls() {
        // One call over 4 bytes must equal two calls over 2 bytes each.
        let whole = run(&[0b11001100, 0b11001100, 0b11111111, 0b00000000], 2);

        let mut state = DownsampleState::default();
        let mut split = downsample(&[0b11001100, 0b11001100], 2, &mut state);
        split.extend(downsample(&[0b11111111, 0b00000000], 2, &mut state));

        assert_eq!(split, whole);
    }

    #[test]
    fn partial_output_byte_is_held_back() {
        let mut state = DownsampleState::default();
        // 8 input bits at zoom 2 produce only 4 output bits.
        assert!(downsample(&[0xff], 2, &mut state).is_empty());
        // The next 8 bits complete the byte.
        assert_eq!(downsample(&[0x00], 2, &mut state), vec![0xf0]);
    }
}
