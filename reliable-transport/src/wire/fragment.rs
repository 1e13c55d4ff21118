use packable::{Packable, Reader};

pub const FRAGMENT_HEADER_SIZE: usize = 10;

/// 10-byte fragment header: `msg_id, index, count, total_len, msg_crc32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Packable)]
pub struct FragmentHeader {
    pub msg_id: u16,
    pub index: u8,
    pub count: u8,
    pub total_len: u16,
    pub msg_crc32: u32,
}

impl FragmentHeader {
    pub fn decode(bytes: &[u8]) -> Option<(Self, &[u8])> {
        let mut r = Reader::new(bytes);
        let header = Self::unpack(&mut r).ok()?;
        let rest = r.read_rest();
        Some((header, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packable::Writer;

    #[test]
    fn round_trips() {
        let header = FragmentHeader {
            msg_id: 5,
            index: 2,
            count: 7,
            total_len: 123,
            msg_crc32: 0xdead_beef,
        };
        let mut w = Writer::new();
        header.pack(&mut w);
        w.write_bytes(b"payload");
        let bytes = w.into_vec();
        assert_eq!(header.packed_len(), FRAGMENT_HEADER_SIZE);
        let (decoded, rest) = FragmentHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(rest, b"payload");
    }
}
