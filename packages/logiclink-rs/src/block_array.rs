//! Multi resolution sample store for one channel group.
//!
//! Level 0 keeps the data as acquired. Every deeper level keeps the same
//! signal reduced by `zoom_per_level`, so a render of N samples at a high
//! zoom factor touches a fraction of the bytes. Appends cascade: the
//! incoming block is committed at level 0, its downsampled copy at level 1
//! and so on. An ordered index per level maps the last sample number of
//! every block to its position, which turns range queries into two
//! `BTreeMap` lookups.

use std::collections::BTreeMap;

use crate::block::{join, Block};
use crate::downsample::{downsample, DownsampleState};
use crate::error::{Error, Result};
use crate::types::Bytes;

#[derive(Debug)]
struct Level {
    zoom_out: u64,
    /// One stateful sampler per channel. Produces the next level's data.
    samplers: Vec<DownsampleState>,
    blocks: Vec<Block>,
    /// last sample number -> index into `blocks`.
    index: BTreeMap<u64, usize>,
}

#[derive(Debug)]
pub struct BlockArray {
    levels: Vec<Level>,
    zoom_per_level: usize,
    channels: usize,
    /// Total appended length counted in raw (zoom 1) samples.
    channel_len: u64,
}

pub const DEFAULT_ZOOM_OUT_LEVELS: usize = 8;
pub const DEFAULT_ZOOM_OUT_PER_LEVEL: usize = 8;

impl BlockArray {
    pub fn new(channels: usize, max_zoom_out_levels: usize, zoom_per_level: usize) -> Self {
        let levels = (0..max_zoom_out_levels.max(1))
            .map(|lev| Level {
                zoom_out: (zoom_per_level as u64).pow(lev as u32),
                samplers: vec![DownsampleState::default(); channels],
                blocks: Vec::new(),
                index: BTreeMap::new(),
            })
            .collect();

        BlockArray {
            levels,
            zoom_per_level,
            channels,
            channel_len: 0,
        }
    }

    pub fn channels_number(&self) -> usize {
        self.channels
    }

    /// Length in raw samples.
    pub fn channel_len(&self) -> u64 {
        self.channel_len
    }

    pub fn append(&mut self, bits_per_sample: u8, channels: Vec<Bytes>) -> Result<()> {
        if channels.is_empty() {
            return Ok(());
        }

        if channels.len() != self.channels {
            return Err(Error::ChannelMismatch);
        }

        let ch_len_bytes = channels[0].len();
        if channels.iter().any(|ch| ch.len() != ch_len_bytes) {
            return Err(Error::BlockSizeMismatch);
        }

        let samples_per_byte = 8 / u64::from(bits_per_sample);
        let ch_len_bits = ch_len_bytes as u64 * samples_per_byte;
        if ch_len_bits == 0 {
            return Ok(());
        }

        let mut block = Block::new(bits_per_sample, channels, 1);

        for lev in 0..self.levels.len() {
            block.set_zoom_out(self.levels[lev].zoom_out);

            let next = if lev + 1 < self.levels.len() {
                Some(self.zoomed(&block, lev))
            } else {
                None
            };

            self.commit(lev, block, ch_len_bytes);

            match next {
                Some(b) => block = b,
                None => break,
            }
        }

        self.channel_len += ch_len_bits;
        Ok(())
    }

    /// Downsamples `block` by `zoom_per_level` with the samplers of `lev`,
    /// producing data for the level below.
    fn zoomed(&mut self, block: &Block, lev: usize) -> Block {
        let zoom = self.zoom_per_level;
        let samplers = &mut self.levels[lev].samplers;

        let data: Vec<Bytes> = block
            .data()
            .iter()
            .zip(samplers.iter_mut())
            .map(|(channel, state)| downsample(channel, zoom, state))
            .collect();

        Block::new(block.bits_per_sample(), data, 1)
    }

    fn commit(&mut self, lev: usize, mut block: Block, append_bytes: usize) {
        let level = &mut self.levels[lev];

        // Start a new block once the last one has grown to at least one
        // append worth of bytes, otherwise extend it in place.
        let extend = level
            .blocks
            .last()
            .is_some_and(|last| last.bytes_used() < append_bytes);

        if extend {
            let last = level.blocks.last_mut().unwrap();
            // Same level, same channel count, checked on the way in.
            let _ = last.append(block);
        } else {
            // Blocks of a level are contiguous, so a new block starts right
            // after the previous one. With uneven append sizes the samplers
            // hold partial bits, which makes this lag the raw `channel_len`.
            let first = level.blocks.last().map_or(0, |b| b.last_sample() + 1);
            block.set_first_sample(first);
            level.blocks.push(block);
        }

        // One index entry per block. Appending in place moved the last
        // block's key, so drop the highest key before reinserting.
        if level.index.len() >= level.blocks.len() {
            if let Some((&key, _)) = level.index.iter().next_back() {
                level.index.remove(&key);
            }
        }

        let last = level.blocks.last().unwrap();
        level.index.insert(last.last_sample(), level.blocks.len() - 1);
    }

    /// Picks the deepest level whose zoom does not exceed `zoom_out` and
    /// returns the run of its blocks overlapping `begin..end` (raw sample
    /// numbers). With `peek` the query reaches one stored sample further
    /// back, which lets a reader stitch consecutive reads together.
    pub fn range(&self, mut begin: u64, end: u64, zoom_out: u64, peek: bool) -> &[Block] {
        if begin == end {
            return &[];
        }

        let level = self
            .levels
            .iter()
            .rev()
            .find(|lev| lev.zoom_out <= zoom_out)
            .unwrap_or(&self.levels[0]);

        if peek {
            begin = begin.saturating_sub(level.zoom_out);
        }

        let Some((_, &first)) = level.index.range(begin..).next() else {
            return &[];
        };

        let last = match level.index.range(end..).next() {
            Some((_, &idx)) => idx,
            None => level.blocks.len() - 1,
        };

        &level.blocks[first..=last]
    }

    /// Contiguous copy of `begin..end`, level 0 only. Sample numbers are
    /// byte aligned for 1 bit samples, so `begin` must fall on a byte
    /// boundary of every block involved.
    pub fn clip(&self, begin: u64, end: u64, bits_per_sample: u8) -> Result<Block> {
        let blocks = self.range(begin, end, 1, false);

        let Some(front) = blocks.first() else {
            return Ok(Block::default());
        };

        let samples_per_byte = u64::from(8 / bits_per_sample);
        let last_block = blocks.last().unwrap();

        let mut total = (end.min(last_block.last_sample() + 1) - begin) / samples_per_byte;

        let mut out: Vec<Bytes> = (0..front.channels_number())
            .map(|_| Bytes::with_capacity(total as usize))
            .collect();

        for (cnt, block) in blocks.iter().enumerate() {
            let in_start = if cnt == 0 {
                ((begin - block.first_sample()) / samples_per_byte) as usize
            } else {
                0
            };

            let len = (total as usize).min(block.bytes_used() - in_start);
            total -= len as u64;

            for (ch, dest) in out.iter_mut().enumerate() {
                dest.extend_from_slice(&block.channel(ch)[in_start..in_start + len]);
            }
        }

        let mut block = Block::new(front.bits_per_sample(), out, 1);
        block.set_first_sample(begin);
        Ok(block)
    }

    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.blocks.clear();
            level.index.clear();
            for s in &mut level.samplers {
                *s = DownsampleState::default();
            }
        }

        self.channel_len = 0;
    }
}
