use packable::{Packable, Reader};

pub const RECORD_HEADER_SIZE: usize = 4;

/// Record-level flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(pub u8);

impl RecordFlags {
    pub const NONE: u8 = 0;
    pub const RELIABLE: u8 = 1 << 0;
    pub const URGENT: u8 = 1 << 1;

    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// 4-byte record header: `type, flags, length`. `length` is the length of
/// the body that follows, not including this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Packable)]
pub struct RecordHeader {
    pub type_code: u8,
    pub flags: u8,
    pub length: u16,
}

impl RecordHeader {
    pub fn new(type_code: u8, flags: RecordFlags, length: u16) -> Self {
        Self {
            type_code,
            flags: flags.0,
            length,
        }
    }

    pub fn flags(&self) -> RecordFlags {
        RecordFlags(self.flags)
    }

    /// Decodes a header and splits off its declared body from `rest`.
    /// Returns `None` if the buffer is too short to hold the header or the
    /// declared body overruns what remains — a malformed-wire-input
    /// condition the caller drops instead of raising.
    pub fn decode(bytes: &[u8]) -> Option<(Self, &[u8], &[u8])> {
        let mut r = Reader::new(bytes);
        let header = Self::unpack(&mut r).ok()?;
        let body = r.read_bytes(header.length as usize).ok()?;
        let rest = r.read_rest();
        Some((header, body, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packable::Writer;

    #[test]
    fn round_trips_header_and_body() {
        let header = RecordHeader::new(6, RecordFlags(RecordFlags::RELIABLE), 3);
        let mut w = Writer::new();
        header.pack(&mut w);
        w.write_bytes(b"abc");
        let bytes = w.into_vec();
        let (decoded, body, rest) = RecordHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(body, b"abc");
        assert!(rest.is_empty());
    }

    #[test]
    fn declared_length_overrunning_buffer_fails() {
        let header = RecordHeader::new(6, RecordFlags::default(), 10);
        let mut w = Writer::new();
        header.pack(&mut w);
        w.write_bytes(b"ab");
        let bytes = w.into_vec();
        assert!(RecordHeader::decode(&bytes).is_none());
    }
}
