use packable::{Packable, Reader};

use crate::seq::SeqNum;

/// `"RP"` as a big-endian `u16`.
pub const PACKET_MAGIC: u16 = u16::from_be_bytes(*b"RP");
pub const PACKET_VERSION: u8 = 1;
pub const PACKET_HEADER_SIZE: usize = 10;

/// Packet-level flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(pub u8);

impl PacketFlags {
    pub const RELIABLE: u8 = 1 << 0;
    pub const FRAGMENT: u8 = 1 << 1;
    pub const CONTROL: u8 = 1 << 2;

    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn with(mut self, bit: u8) -> Self {
        self.0 |= bit;
        self
    }
}

/// 10-byte packet header: `magic, version, flags, seq, rid, reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Packable)]
pub struct PacketHeader {
    pub magic: u16,
    pub version: u8,
    pub flags: u8,
    pub seq: u16,
    pub rid: u16,
    pub reserved: u16,
}

impl PacketHeader {
    pub fn new(flags: PacketFlags, seq: SeqNum, rid: SeqNum) -> Self {
        Self {
            magic: PACKET_MAGIC,
            version: PACKET_VERSION,
            flags: flags.0,
            seq: seq.0,
            rid: rid.0,
            reserved: 0,
        }
    }

    pub fn flags(&self) -> PacketFlags {
        PacketFlags(self.flags)
    }

    pub fn seq(&self) -> SeqNum {
        SeqNum(self.seq)
    }

    pub fn rid(&self) -> SeqNum {
        SeqNum(self.rid)
    }

    /// `true` once the header's invariants hold: matching magic/version and
    /// a zeroed reserved field. A packet failing this check is discarded
    /// wholesale, never surfaced as an error to the caller.
    pub fn is_valid(&self) -> bool {
        self.magic == PACKET_MAGIC && self.version == PACKET_VERSION && self.reserved == 0
    }

    /// Decodes and validates a packet header in one step. Returns `None` on
    /// any malformed-wire-input condition (truncated buffer, bad magic,
    /// unsupported version, non-zero reserved) — the caller drops the whole
    /// packet and emits a diagnostic instead.
    pub fn decode(bytes: &[u8]) -> Option<(Self, &[u8])> {
        let mut r = Reader::new(bytes);
        let header = Self::unpack(&mut r).ok()?;
        if !header.is_valid() {
            return None;
        }
        let rest = r.read_rest();
        Some((header, rest))
    }
}
