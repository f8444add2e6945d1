//! Test signal generators. Used by the demo device and the unit tests.

use crate::types::Bytes;

/// Square wave generator with state carried between calls, so consecutive
/// buffers form one continuous waveform.
#[derive(Debug, Clone)]
pub struct Square {
    state: bool,
    scnt: usize,
}

impl Default for Square {
    fn default() -> Self {
        Square {
            state: true,
            scnt: 0,
        }
    }
}

impl Square {
    pub fn starting_low() -> Self {
        Square {
            state: false,
            scnt: 0,
        }
    }

    /// Produces `bits_total / 8` bytes of a wave that stays high for
    /// `hi_bits` samples and low for `lo_bits`. Bits are placed MSB first.
    pub fn generate(&mut self, hi_bits: usize, lo_bits: usize, bits_total: usize) -> Bytes {
        let mut buf = vec![0u8; bits_total / 8];

        for b in &mut buf {
            for i in (0..8).rev() {
                if self.state {
                    *b |= 1 << i;

                    self.scnt += 1;
                    if self.scnt >= hi_bits {
                        self.state = false;
                        self.scnt = 0;
                    }
                } else {
                    self.scnt += 1;
                    if self.scnt >= lo_bits {
                        self.state = true;
                        self.scnt = 0;
                    }
                }
            }
        }

        buf
    }
}

pub fn square(hi_bits: usize, lo_bits: usize, bits_total: usize) -> Bytes {
    Square::default().generate(hi_bits, lo_bits, bits_total)
}

/// minstd_rand0 linear congruential generator. Deterministic across
/// platforms, which makes the demo device output reproducible.
#[derive(Debug, Clone)]
pub struct Random {
    state: u32,
}

impl Default for Random {
    fn default() -> Self {
        Random { state: 1 }
    }
}

impl Random {
    pub fn with_seed(seed: u32) -> Self {
        Random {
            state: seed.max(1),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = (u64::from(self.state) * 16807 % 2147483647) as u32;
        self.state
    }

    pub fn generate(&mut self, bits_total: usize) -> Bytes {
        (0..bits_total / 8).map(|_| (self.next_u32() % 256) as u8).collect()
    }
}
