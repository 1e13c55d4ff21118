//! Closed set of application-level record variants and their type-code
//! registry. Each variant carries its own encoder/decoder
//! and a fixed reliability default; a single `decode` dispatch table maps
//! type codes to variant decoders instead of per-variant dynamic dispatch.

use packable::{Packable, Reader, Writer};

use crate::wire::{RecordFlags, RecordHeader};

pub const HELLO: u8 = 1;
pub const WELCOME: u8 = 2;
pub const AUTH: u8 = 3;
pub const AUTH_RESULT: u8 = 4;
pub const DISCONNECT: u8 = 5;
pub const ACK: u8 = 6;
pub const PING: u8 = 7;
pub const PONG: u8 = 8;
pub const SNAPSHOT: u8 = 9;
pub const DELTA: u8 = 10;
pub const INPUT: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Packable)]
pub struct AckFields {
    pub ack_base: u16,
    pub mask: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Packable)]
pub struct PingFields {
    pub id: u16,
    pub ms: u32,
}

/// The closed set of application-level records this transport understands.
///
/// The handshake variants (`Hello`/`Welcome`/`Auth`/`AuthResult`/
/// `Disconnect`) and the ECS-facing variants (`Snapshot`/`Delta`/`Input`)
/// carry opaque bytes: their contents are an external collaborator's
/// concern; the catalog only needs to frame and route them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Hello(Vec<u8>),
    Welcome(Vec<u8>),
    Auth(Vec<u8>),
    AuthResult(Vec<u8>),
    Disconnect(Vec<u8>),
    Ack { ack_base: u16, mask: u16 },
    Ping { id: u16, ms: u32 },
    Pong { id: u16, ms: u32 },
    Snapshot(Vec<u8>),
    Delta(Vec<u8>),
    Input(Vec<u8>),
}

impl Record {
    pub fn type_code(&self) -> u8 {
        match self {
            Record::Hello(_) => HELLO,
            Record::Welcome(_) => WELCOME,
            Record::Auth(_) => AUTH,
            Record::AuthResult(_) => AUTH_RESULT,
            Record::Disconnect(_) => DISCONNECT,
            Record::Ack { .. } => ACK,
            Record::Ping { .. } => PING,
            Record::Pong { .. } => PONG,
            Record::Snapshot(_) => SNAPSHOT,
            Record::Delta(_) => DELTA,
            Record::Input(_) => INPUT,
        }
    }

    /// The reliability a fresh record of this variant carries unless the
    /// caller overrides it. Handshake records must complete so they default
    /// reliable; `Disconnect` is best-effort notice so it does not; ACK/
    /// ping/pong travel unreliably by design; the ECS-facing
    /// variants default reliable.
    pub fn default_reliable(&self) -> bool {
        matches!(
            self,
            Record::Hello(_)
                | Record::Welcome(_)
                | Record::Auth(_)
                | Record::AuthResult(_)
                | Record::Snapshot(_)
                | Record::Delta(_)
                | Record::Input(_)
        )
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Record::Hello(b)
            | Record::Welcome(b)
            | Record::Auth(b)
            | Record::AuthResult(b)
            | Record::Disconnect(b)
            | Record::Snapshot(b)
            | Record::Delta(b)
            | Record::Input(b) => w.write_bytes(b),
            Record::Ack { ack_base, mask } => AckFields {
                ack_base: *ack_base,
                mask: *mask,
            }
            .pack(&mut w),
            Record::Ping { id, ms } | Record::Pong { id, ms } => {
                PingFields { id: *id, ms: *ms }.pack(&mut w)
            }
        }
        w.into_vec()
    }

    /// Encodes this record as a full record TLV: 4-byte header + body.
    pub fn encode(&self, reliable: bool) -> Vec<u8> {
        let body = self.encode_body();
        let mut flags = RecordFlags::NONE;
        if reliable {
            flags |= RecordFlags::RELIABLE;
        }
        let header = RecordHeader::new(self.type_code(), RecordFlags(flags), body.len() as u16);
        let mut w = Writer::with_capacity(header.packed_len() + body.len());
        header.pack(&mut w);
        w.write_bytes(&body);
        w.into_vec()
    }

    /// Decodes a record body given its already-parsed type code. Returns
    /// `None` for an unknown type code or a malformed body — the envelope
    /// opener fails the whole envelope on this.
    pub fn decode(type_code: u8, body: &[u8]) -> Option<Self> {
        match type_code {
            HELLO => Some(Record::Hello(body.to_vec())),
            WELCOME => Some(Record::Welcome(body.to_vec())),
            AUTH => Some(Record::Auth(body.to_vec())),
            AUTH_RESULT => Some(Record::AuthResult(body.to_vec())),
            DISCONNECT => Some(Record::Disconnect(body.to_vec())),
            ACK => {
                let mut r = Reader::new(body);
                let f = AckFields::unpack(&mut r).ok()?;
                Some(Record::Ack {
                    ack_base: f.ack_base,
                    mask: f.mask,
                })
            }
            PING => {
                let mut r = Reader::new(body);
                let f = PingFields::unpack(&mut r).ok()?;
                Some(Record::Ping { id: f.id, ms: f.ms })
            }
            PONG => {
                let mut r = Reader::new(body);
                let f = PingFields::unpack(&mut r).ok()?;
                Some(Record::Pong { id: f.id, ms: f.ms })
            }
            SNAPSHOT => Some(Record::Snapshot(body.to_vec())),
            DELTA => Some(Record::Delta(body.to_vec())),
            INPUT => Some(Record::Input(body.to_vec())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_round_trips() {
        let rec = Record::Ack {
            ack_base: 13,
            mask: 0b111,
        };
        let bytes = rec.encode(false);
        let (header, body, rest) = RecordHeader::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        let decoded = Record::decode(header.type_code, body).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn ping_round_trips() {
        let rec = Record::Ping { id: 1, ms: 100 };
        let bytes = rec.encode(false);
        let (header, body, _) = RecordHeader::decode(&bytes).unwrap();
        assert_eq!(header.type_code, PING);
        assert_eq!(Record::decode(header.type_code, body).unwrap(), rec);
    }

    #[test]
    fn delta_blob_round_trips_and_defaults_reliable() {
        let rec = Record::Delta(b"test payload".to_vec());
        assert!(rec.default_reliable());
        let bytes = rec.encode(rec.default_reliable());
        let (header, body, _) = RecordHeader::decode(&bytes).unwrap();
        assert!(header.flags().has(RecordFlags::RELIABLE));
        assert_eq!(
            Record::decode(header.type_code, body).unwrap(),
            Record::Delta(b"test payload".to_vec())
        );
    }

    #[test]
    fn unknown_type_code_fails_to_decode() {
        assert!(Record::decode(200, b"").is_none());
    }
}
