//! Declarative struct-to-bytes mapping for fixed-width big-endian wire types.
//!
//! `Packable` is the runtime half of the codec; `packable-derive` supplies
//! `#[derive(Packable)]` so struct fields are packed/unpacked in declaration
//! order without hand-written boilerplate. Every wire format in this crate's
//! consumers is big-endian, so that is the only byte order `Writer`/`Reader`
//! support.

use thiserror::Error;

pub use packable_derive::Packable;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PackError {
    #[error("unexpected end of buffer: needed {needed} more byte(s), had {available}")]
    UnexpectedEof { needed: usize, available: usize },
    #[error("length-prefixed field declared {declared} bytes but only {available} remained")]
    LengthMismatch { declared: usize, available: usize },
}

/// Accumulates packed bytes for a single envelope/record/header.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// A cursor over a byte slice used while decoding.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn require(&self, needed: usize) -> Result<(), PackError> {
        if self.remaining() < needed {
            Err(PackError::UnexpectedEof {
                needed,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, PackError> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, PackError> {
        self.require(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, PackError> {
        self.require(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(arr))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        self.require(n)?;
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Remainder of the buffer, consuming it.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

/// Declarative struct-to-bytes mapping. `#[derive(Packable)]` implements this
/// for structs whose fields are themselves `Packable` (u8/u16/u32 or another
/// `Packable` type), packing and unpacking them in declaration order.
pub trait Packable: Sized {
    fn pack(&self, w: &mut Writer);
    fn unpack(r: &mut Reader) -> Result<Self, PackError>;
    /// Encoded size in bytes. Must match the number of bytes `pack` writes.
    fn packed_len(&self) -> usize;
}

impl Packable for u8 {
    fn pack(&self, w: &mut Writer) {
        w.write_u8(*self);
    }
    fn unpack(r: &mut Reader) -> Result<Self, PackError> {
        r.read_u8()
    }
    fn packed_len(&self) -> usize {
        1
    }
}

impl Packable for u16 {
    fn pack(&self, w: &mut Writer) {
        w.write_u16(*self);
    }
    fn unpack(r: &mut Reader) -> Result<Self, PackError> {
        r.read_u16()
    }
    fn packed_len(&self) -> usize {
        2
    }
}

impl Packable for u32 {
    fn pack(&self, w: &mut Writer) {
        w.write_u32(*self);
    }
    fn unpack(r: &mut Reader) -> Result<Self, PackError> {
        r.read_u32()
    }
    fn packed_len(&self) -> usize {
        4
    }
}

/// Length-prefixed byte blob (`length:u16` followed by `length` raw bytes),
/// used for record bodies that carry opaque application payloads
/// (e.g. `Snapshot`/`Delta`/`Input` blobs).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LengthPrefixedBytes(pub Vec<u8>);

impl From<Vec<u8>> for LengthPrefixedBytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<LengthPrefixedBytes> for Vec<u8> {
    fn from(v: LengthPrefixedBytes) -> Self {
        v.0
    }
}

impl Packable for LengthPrefixedBytes {
    fn pack(&self, w: &mut Writer) {
        w.write_u16(self.0.len() as u16);
        w.write_bytes(&self.0);
    }

    fn unpack(r: &mut Reader) -> Result<Self, PackError> {
        let len = r.read_u16()? as usize;
        if r.remaining() < len {
            return Err(PackError::LengthMismatch {
                declared: len,
                available: r.remaining(),
            });
        }
        Ok(Self(r.read_bytes(len)?.to_vec()))
    }

    fn packed_len(&self) -> usize {
        2 + self.0.len()
    }
}
