use serde::{Deserialize, Serialize};

pub type Bytes = Vec<u8>;

/// Samples per second.
pub type SampleRate = u32;

/// One transfer as it arrived from the device, before any decoding.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawBlock {
    /// Instantaneous transfer speed in Mbit/s.
    pub mbps: f64,
    /// Overruns detected while receiving this transfer.
    pub overruns: usize,
    pub data: Bytes,
}

/// Transfer decoded into per-channel sample buffers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub digital: Vec<Bytes>,
    pub analog: Vec<Bytes>,
}
