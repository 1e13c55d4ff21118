//! Splits over-sized records into fragments and reassembles them by message
//! id, with CRC32 corruption detection, TTL expiry and capacity eviction.

use std::time::Instant;

use crc32fast::Hasher;
use packable::Packable;

use crate::config::DefragConfig;
use crate::error::TransportError;
use crate::wire::{FragmentHeader, FRAGMENT_HEADER_SIZE};

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Splits oversized payloads into fragment-header-prefixed chunks.
#[derive(Debug)]
pub struct Fragmenter {
    next_msg_id: u16,
}

impl Fragmenter {
    pub fn new() -> Self {
        Self { next_msg_id: 0 }
    }

    /// Splits `payload` into `ceil(len / fragment_size)` wire-ready chunks,
    /// each `header + slice`, where `fragment_size = mtu - fragment_header_size`.
    /// Fails with `InvalidMtu` rather than panicking when `mtu` is too small
    /// to hold even the fragment header.
    pub fn fragment(&mut self, payload: &[u8], mtu: usize) -> Result<Vec<Vec<u8>>, TransportError> {
        if mtu <= FRAGMENT_HEADER_SIZE {
            return Err(TransportError::InvalidMtu {
                mtu,
                header_size: FRAGMENT_HEADER_SIZE,
            });
        }
        let fragment_size = mtu - FRAGMENT_HEADER_SIZE;
        let msg_crc32 = crc32(payload);
        let msg_id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);

        let chunks: Vec<&[u8]> = payload.chunks(fragment_size.max(1)).collect();
        let count = chunks.len().max(1) as u8;

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let header = FragmentHeader {
                    msg_id,
                    index: index as u8,
                    count,
                    total_len: payload.len() as u16,
                    msg_crc32,
                };
                let mut w = packable::Writer::with_capacity(FRAGMENT_HEADER_SIZE + chunk.len());
                header.pack(&mut w);
                w.write_bytes(chunk);
                w.into_vec()
            })
            .collect())
    }
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new()
    }
}

struct Bucket {
    count: u8,
    total_len: u16,
    msg_crc32: u32,
    slots: Vec<Option<Vec<u8>>>,
    received: usize,
    created_at: Instant,
}

/// Reassembles fragments by `msg_id`, bounded by a bucket capacity and TTL.
pub struct Defragmenter {
    config: DefragConfig,
    buckets: std::collections::HashMap<u16, Bucket>,
}

impl Defragmenter {
    pub fn new(config: DefragConfig) -> Self {
        Self {
            config,
            buckets: std::collections::HashMap::new(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn purge_expired(&mut self, now: Instant) {
        let ttl = self.config.ttl;
        self.buckets.retain(|_, b| now.duration_since(b.created_at) < ttl);
    }

    fn evict_oldest(&mut self) {
        if let Some((&oldest_id, _)) = self.buckets.iter().min_by_key(|(_, b)| b.created_at) {
            self.buckets.remove(&oldest_id);
        }
    }

    /// Feeds one fragment; purges expired buckets first, then registers the
    /// fragment, evicting the oldest bucket if capacity is exceeded. Returns
    /// `Some(payload)` once the message is complete and its CRC32 checks out.
    pub fn register_fragment(&mut self, bytes: &[u8], now: Instant) -> Option<Vec<u8>> {
        self.purge_expired(now);

        let (header, chunk) = FragmentHeader::decode(bytes)?;

        if !self.buckets.contains_key(&header.msg_id) {
            if self.buckets.len() >= self.config.capacity {
                self.evict_oldest();
            }
            self.buckets.insert(
                header.msg_id,
                Bucket {
                    count: header.count,
                    total_len: header.total_len,
                    msg_crc32: header.msg_crc32,
                    slots: vec![None; header.count as usize],
                    received: 0,
                    created_at: now,
                },
            );
        }

        let bucket = self.buckets.get_mut(&header.msg_id)?;
        if bucket.msg_crc32 != header.msg_crc32 || bucket.count != header.count {
            self.buckets.remove(&header.msg_id);
            return None;
        }

        let slot = bucket.slots.get_mut(header.index as usize)?;
        if slot.is_none() {
            *slot = Some(chunk.to_vec());
            bucket.received += 1;
        }

        if bucket.received != bucket.count as usize {
            return None;
        }

        let bucket = self.buckets.remove(&header.msg_id)?;
        let mut payload = Vec::with_capacity(bucket.total_len as usize);
        for slot in bucket.slots {
            payload.extend_from_slice(&slot?);
        }

        if payload.len() != bucket.total_len as usize || crc32(&payload) != bucket.msg_crc32 {
            return None;
        }
        Some(payload)
    }
}
