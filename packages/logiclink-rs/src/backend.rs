//! Thread safe facade over the per-group [`BlockArray`] stores.
//!
//! The acquisition thread appends, readers query ranges. Instead of an
//! observer list the backend counts appends; a reader remembers the last
//! version it saw and polls or waits for a newer one.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::block::{join, Block};
use crate::block_array::BlockArray;
use crate::error::{Error, Result};
use crate::types::Bytes;

#[derive(Debug, Clone, Copy)]
pub struct GroupConfig {
    pub channels: usize,
    pub max_zoom_out_levels: usize,
    pub zoom_out_per_level: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            channels: 1,
            max_zoom_out_levels: crate::block_array::DEFAULT_ZOOM_OUT_LEVELS,
            zoom_out_per_level: crate::block_array::DEFAULT_ZOOM_OUT_PER_LEVEL,
        }
    }
}

#[derive(Debug, Default)]
pub struct Backend {
    groups: Mutex<Vec<BlockArray>>,
    version: Mutex<u64>,
    new_data: Condvar,
}

impl Backend {
    pub fn new() -> Self {
        Backend::default()
    }

    pub fn add_group(&self, config: GroupConfig) -> usize {
        let mut groups = self.groups.lock().unwrap();
        groups.push(BlockArray::new(
            config.channels,
            config.max_zoom_out_levels,
            config.zoom_out_per_level,
        ));
        groups.len() - 1
    }

    pub fn append(&self, group: usize, bits_per_sample: u8, channels: Vec<Bytes>) -> Result<()> {
        {
            let mut groups = self.groups.lock().unwrap();
            groups
                .get_mut(group)
                .ok_or(Error::NoSuchGroup(group))?
                .append(bits_per_sample, channels)?;
        }

        self.bump();
        Ok(())
    }

    pub fn clear(&self) {
        {
            let mut groups = self.groups.lock().unwrap();
            for g in groups.iter_mut() {
                g.clear();
            }
        }

        self.bump();
    }

    fn bump(&self) {
        *self.version.lock().unwrap() += 1;
        self.new_data.notify_all();
    }

    /// Runs `f` over the blocks overlapping `begin..end`. The group lock is
    /// held for the duration of the call, keep `f` short.
    pub fn with_range<R>(
        &self,
        group: usize,
        begin: u64,
        end: u64,
        zoom_out: u64,
        peek: bool,
        f: impl FnOnce(&[Block]) -> R,
    ) -> R {
        let groups = self.groups.lock().unwrap();
        match groups.get(group) {
            Some(g) => f(g.range(begin, end, zoom_out, peek)),
            None => f(&[]),
        }
    }

    /// Contiguous copy of `begin..end` at full resolution.
    pub fn clip(&self, group: usize, begin: u64, end: u64, bits_per_sample: u8) -> Result<Block> {
        let groups = self.groups.lock().unwrap();
        groups
            .get(group)
            .ok_or(Error::NoSuchGroup(group))?
            .clip(begin, end, bits_per_sample)
    }

    pub fn channel_len(&self, group: usize) -> u64 {
        self.groups.lock().unwrap().get(group).map_or(0, BlockArray::channel_len)
    }

    pub fn channels_number(&self, group: usize) -> usize {
        self.groups
            .lock()
            .unwrap()
            .get(group)
            .map_or(0, BlockArray::channels_number)
    }

    pub fn version(&self) -> u64 {
        *self.version.lock().unwrap()
    }

    /// Blocks until the version moves past `seen` or the timeout elapses.
    /// Returns the current version, which equals `seen` on timeout.
    pub fn wait_for_new_data(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = self.version.lock().unwrap();
        let (guard, _) = self
            .new_data
            .wait_timeout_while(guard, timeout, |v| *v == seen)
            .unwrap();
        *guard
    }
}

/// Read side handle. Remembers the backend version it last consumed.
#[derive(Debug)]
pub struct DigitalFrontend<'a> {
    backend: &'a Backend,
    seen: u64,
}

impl<'a> DigitalFrontend<'a> {
    pub fn new(backend: &'a Backend) -> Self {
        DigitalFrontend { backend, seen: 0 }
    }

    pub fn backend(&self) -> &Backend {
        self.backend
    }

    /// True once per batch of appends since the previous call.
    pub fn is_new_data(&mut self) -> bool {
        let version = self.backend.version();
        let fresh = version != self.seen;
        self.seen = version;
        fresh
    }

    /// Packed samples of one channel, `length` samples starting at `begin`.
    /// 1 bit samples are repacked MSB first, so an unaligned `begin` works.
    pub fn channel(&self, group: usize, channel: usize, begin: u64, length: u64) -> Bytes {
        if channel >= self.backend.channels_number(group) {
            return Bytes::new();
        }

        self.backend
            .with_range(group, begin, begin + length, 1, false, |blocks| {
                let joined = join(blocks).unwrap_or_default();

                if joined.bytes_used() == 0 {
                    return Bytes::new();
                }

                let off = begin.saturating_sub(joined.first_sample());
                extract_bits(joined.channel(channel), off, length)
            })
    }
}

/// Copies `length` bits starting at bit `offset`, repacking MSB first.
fn extract_bits(data: &[u8], offset: u64, length: u64) -> Bytes {
    let mut out = Bytes::with_capacity((length as usize).div_ceil(8));
    let mut acc = 0u8;
    let mut fill = 0;

    for i in offset..(offset + length).min(data.len() as u64 * 8) {
        let byte = data[(i / 8) as usize];
        let bit = byte >> (7 - i % 8) & 1;

        acc = acc << 1 | bit;
        fill += 1;

        if fill == 8 {
            out.push(acc);
            acc = 0;
            fill = 0;
        }
    }

    if fill > 0 {
        out.push(acc << (8 - fill));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_moves_on_append() {
        let backend = Backend::new();
        let group = backend.add_group(GroupConfig {
            channels: 1,
            ..GroupConfig::default()
        });

        let mut frontend = DigitalFrontend::new(&backend);
        assert!(!frontend.is_new_data());

        backend.append(group, 1, vec![vec![0xff, 0x00]]).unwrap();
        assert!(frontend.is_new_data());
        assert!(!frontend.is_new_data());

        assert_eq!(backend.channel_len(group), 16);
        backend.clear();
        assert_eq!(backend.channel_len(group), 0);
        assert!(frontend.is_new_data());
    }

    #[test]
    fn range_through_backend() {
        let backend = Backend::new();
        let group = backend.add_group(GroupConfig {
            channels: 1,
            ..GroupConfig::default()
        });

        backend.append(group, 1, vec![vec![0x0, 0x1]]).unwrap();
        backend.append(group, 1, vec![vec![0x2, 0x3]]).unwrap();

        let bytes = backend.with_range(group, 0, 32, 1, false, |blocks| {
            blocks.iter().map(Block::bytes_used).sum::<usize>()
        });
        assert_eq!(bytes, 4);

        let clip = backend.clip(group, 8, 24, 1).unwrap();
        assert_eq!(clip.channel(0), &[0x1, 0x2]);
    }

    #[test]
    fn frontend_channel_repacks_bits() {
        let backend = Backend::new();
        let group = backend.add_group(GroupConfig {
            channels: 2,
            ..GroupConfig::default()
        });

        backend
            .append(group, 1, vec![vec![0b10110000, 0b10000000], vec![0xff, 0xff]])
            .unwrap();

        let frontend = DigitalFrontend::new(&backend);

        assert_eq!(frontend.channel(group, 0, 0, 8), vec![0b10110000]);
        // Unaligned begin shifts the window.
        assert_eq!(frontend.channel(group, 0, 2, 8), vec![0b11000010]);
        // Channel out of bounds.
        assert!(frontend.channel(group, 2, 0, 8).is_empty());
        // Short reads are truncated, not padded.
        assert_eq!(frontend.channel(group, 1, 8, 16), vec![0xff]);
    }

    #[test]
    fn unknown_group_ids_do_not_panic() {
        let backend = Backend::new();
        let group = backend.add_group(GroupConfig {
            channels: 1,
            ..GroupConfig::default()
        });
        backend.append(group, 1, vec![vec![0xff]]).unwrap();

        assert!(matches!(
            backend.append(group + 1, 1, vec![vec![0xff]]),
            Err(Error::NoSuchGroup(1))
        ));
        assert!(matches!(
            backend.clip(group + 1, 0, 8, 1),
            Err(Error::NoSuchGroup(1))
        ));

        assert_eq!(backend.channel_len(group + 1), 0);
        assert_eq!(backend.channels_number(group + 1), 0);
        assert!(backend.with_range(group + 1, 0, 8, 1, false, <[Block]>::is_empty));

        let frontend = DigitalFrontend::new(&backend);
        assert!(frontend.channel(group + 1, 0, 0, 8).is_empty());
    }

    #[test]
    fn wait_for_new_data_times_out() {
        let backend = Backend::new();
        let seen = backend.version();
        let now = std::time::Instant::now();
        let version = backend.wait_for_new_data(seen, Duration::from_millis(20));
        assert_eq!(version, seen);
        assert!(now.elapsed() >= Duration::from_millis(20));
    }
}
