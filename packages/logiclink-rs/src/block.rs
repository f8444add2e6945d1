//! A run of contiguous samples for every channel of one group.

use crate::error::{Error, Result};
use crate::types::Bytes;

#[derive(Debug, Default, Clone)]
pub struct Block {
    bits_per_sample: u8,
    /// How many raw samples one stored sample stands for.
    zoom_out: u64,
    /// Position of the first sample, counted in raw (zoom 1) samples.
    first_sample: u64,
    /// One buffer per channel, all the same length.
    data: Vec<Bytes>,
}

impl Block {
    pub fn new(bits_per_sample: u8, data: Vec<Bytes>, zoom_out: u64) -> Self {
        Block {
            bits_per_sample,
            zoom_out,
            first_sample: 0,
            data,
        }
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample
    }

    pub fn zoom_out(&self) -> u64 {
        self.zoom_out
    }

    pub(crate) fn set_zoom_out(&mut self, zoom_out: u64) {
        self.zoom_out = zoom_out;
    }

    pub fn first_sample(&self) -> u64 {
        self.first_sample
    }

    pub(crate) fn set_first_sample(&mut self, first: u64) {
        self.first_sample = first;
    }

    pub fn last_sample(&self) -> u64 {
        self.first_sample + u64::from(self.channel_len()).saturating_sub(1)
    }

    pub fn channels_number(&self) -> usize {
        self.data.len()
    }

    pub fn channel(&self, idx: usize) -> &[u8] {
        &self.data[idx]
    }

    pub fn data(&self) -> &[Bytes] {
        &self.data
    }

    /// Bytes stored per channel.
    pub fn bytes_used(&self) -> usize {
        self.data.first().map_or(0, Bytes::len)
    }

    /// Length in raw (zoom 1) samples.
    pub fn channel_len(&self) -> u64 {
        if self.data.is_empty() {
            return 0;
        }

        let samples_per_byte = 8 / u64::from(self.bits_per_sample);
        self.bytes_used() as u64 * samples_per_byte * self.zoom_out
    }

    /// Glues `other` onto the end of this block.
    pub fn append(&mut self, other: Block) -> Result<()> {
        if other.data.len() != self.data.len() {
            return Err(Error::ChannelMismatch);
        }

        self.bits_per_sample = other.bits_per_sample;
        for (dest, src) in self.data.iter_mut().zip(other.data) {
            dest.extend(src);
        }

        Ok(())
    }
}

/// Joins a run of blocks into one contiguous copy.
pub fn join(blocks: &[Block]) -> Result<Block> {
    let Some(front) = blocks.first() else {
        return Ok(Block::default());
    };

    let mut out = Block::new(front.bits_per_sample, Vec::new(), front.zoom_out);
    out.first_sample = front.first_sample;

    let total: usize = blocks.iter().map(Block::bytes_used).sum();
    out.data = (0..front.channels_number())
        .map(|_| Bytes::with_capacity(total))
        .collect();

    for block in blocks {
        if block.channels_number() != out.channels_number() {
            return Err(Error::ChannelMismatch);
        }

        for (ch, dest) in out.data.iter_mut().enumerate() {
            dest.extend_from_slice(block.channel(ch));
        }
    }

    Ok(out)
}
