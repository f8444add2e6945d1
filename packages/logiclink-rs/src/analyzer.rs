//! Debug analyzers. They consume the capture stream live and verify the
//! integrity of well known test signals generated by the device.

use log::{debug, info, warn};

use crate::backend::Backend;
use crate::error::Result;
use crate::params::AcqParams;
use crate::rearrange::rearrange;
use crate::session::Session;
use crate::types::{RawBlock, SampleData};

pub trait Analyzer {
    fn start(&mut self) {}
    /// Sees every transfer before decoding.
    fn run_raw(&mut self, _raw: &RawBlock) {}
    /// Sees the decoded per-channel streams.
    fn run(&mut self, _samples: &SampleData) {}
    fn stop(&mut self) {}
}

/// Pops transfers from the session until the capture finishes, feeding the
/// analyzer and optionally retaining the decoded data in the backend.
pub fn analyze(
    params: &AcqParams,
    session: &Session,
    backend: Option<(&Backend, usize)>,
    analyzer: &mut dyn Analyzer,
) -> Result<()> {
    analyzer.start();

    while let Some(raw) = session.pop_blocking() {
        analyzer.run_raw(&raw);

        let samples = rearrange(&raw.data, params)?;
        if samples.digital.is_empty() {
            continue;
        }

        analyzer.run(&samples);

        if let Some((backend, group)) = backend {
            backend.append(group, 1, samples.digital)?;
        }
    }

    analyzer.stop();
    Ok(())
}

/// No-op sink for captures where only the data retention matters.
#[derive(Debug, Default)]
pub struct NullAnalyzer;

impl Analyzer for NullAnalyzer {}

/// Prints basic per-transfer info. Debug purposes only.
#[derive(Debug, Default)]
pub struct RawPrint {
    cnt: usize,
}

impl Analyzer for RawPrint {
    fn run_raw(&mut self, raw: &RawBlock) {
        debug!(
            "transfer {}: {} B, {:.2} Mbps, overruns {}",
            self.cnt,
            raw.data.len(),
            raw.mbps,
            raw.overruns
        );
        self.cnt += 1;
    }
}

/// Analyzes a perfect square signal down to a single sample.
///
/// Looks for a run of 0s followed by 1s (or the other way around) and
/// measures its period, then expects every following period to match.
/// Any steady square signal works regardless of its frequency. Words are
/// consumed LSB first, which matches the flexio shift direction.
#[derive(Debug)]
pub struct ClockSignalCheck {
    block_len: usize,

    skip: bool,
    second_level: bool,
    prev_bit: bool,
    prev_period: Option<u32>,
    period: u32,
    prev_word: u32,
    errors: usize,
    /// Suppresses a cascade: one corrupted word yields one error.
    last_period_was_error: bool,
    /// Analyze only the `mod`-th 32 bit word out of every `div`.
    decimation: Option<(usize, usize)>,
}

impl ClockSignalCheck {
    pub fn new(block_len: usize) -> Self {
        ClockSignalCheck {
            block_len,
            skip: true,
            second_level: false,
            prev_bit: false,
            prev_period: None,
            period: 0,
            prev_word: 0,
            errors: 0,
            last_period_was_error: false,
            decimation: None,
        }
    }

    pub fn set_decimation(&mut self, div: usize, modulo: usize) {
        self.decimation = Some((div, modulo));
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Feeds a run of words, returns the cumulative error count.
    pub fn check_words(&mut self, words: &[u32]) -> usize {
        for (i, &w) in words.iter().enumerate() {
            let analyzed = match self.decimation {
                Some((div, modulo)) => i % div == modulo,
                None => true,
            };

            if analyzed {
                self.check_word(w);
            }
        }

        self.errors
    }

    fn check_word(&mut self, w: u32) {
        if self.skip {
            // Assumes there is an edge in the first 32 bits.
            self.prev_bit = w & 1 != 0;
        }

        for j in 0..32 {
            let bit = (w >> j) & 1 != 0;

            // The initial run of equal samples (first level) is most likely
            // incomplete, so it does not count towards a period.
            if self.skip {
                if bit != self.prev_bit {
                    self.skip = false;
                    self.period += 1;
                }
            } else if bit != self.prev_bit {
                if !self.second_level {
                    self.second_level = true;
                    self.period += 1;
                } else {
                    self.second_level = false;

                    match self.prev_period {
                        Some(prev) if prev != self.period => {
                            if !self.last_period_was_error {
                                self.errors += 1;
                                warn!(
                                    "period mismatch: {:032b} {:032b} {}:{}",
                                    w, self.prev_word, prev, self.period
                                );
                                self.last_period_was_error = true;
                            }
                        }
                        _ => {
                            self.prev_period = Some(self.period);
                            self.last_period_was_error = false;
                        }
                    }

                    self.period = 1;
                }
            } else {
                self.period += 1;
            }

            self.prev_bit = bit;
        }

        self.prev_word = w;
    }
}

impl Analyzer for ClockSignalCheck {
    fn run(&mut self, samples: &SampleData) {
        let Some(channel) = samples.digital.first() else {
            return;
        };

        for block in channel.chunks(self.block_len.max(4)) {
            let words: Vec<u32> = block
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            self.check_words(&words);
        }
    }

    fn stop(&mut self) {
        if self.errors > 0 {
            warn!("clock check errors: {}", self.errors);
        } else {
            info!("clock check errors: 0");
        }
    }
}

/// Verifies the per-block ordinal counters the device prepends in fixed
/// buffer mode. Gaps count as overruns.
#[derive(Debug)]
pub struct OrdinalCheck {
    block_len: usize,
    last: Option<u32>,
    overruns: usize,
}

impl OrdinalCheck {
    pub fn new(block_len: usize) -> Self {
        OrdinalCheck {
            block_len,
            last: None,
            overruns: 0,
        }
    }

    pub fn overruns(&self) -> usize {
        self.overruns
    }
}

impl Analyzer for OrdinalCheck {
    fn run_raw(&mut self, raw: &RawBlock) {
        for block in raw.data.chunks(self.block_len) {
            if block.len() < 4 {
                continue;
            }

            let ordinal = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);

            if let Some(last) = self.last {
                let diff = i64::from(ordinal) - i64::from(last);
                if diff != 1 {
                    self.overruns += if diff <= 0 { 1 } else { diff as usize };
                }
            }

            self.last = Some(ordinal);
        }
    }

    fn stop(&mut self) {
        if self.overruns > 0 {
            warn!("overflows total: {}", self.overruns);
        } else {
            info!("overflows total: 0");
        }
    }
}
