//! Packs records into MTU-budgeted envelopes and splits them back apart.

use crate::catalog::Record;
use crate::error::TransportError;
use crate::wire::RecordHeader;

/// One packed record's position, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordIndexEntry {
    pub envelope_idx: usize,
    pub type_code: u8,
    pub size: usize,
}

/// A sealed envelope: packed record bytes plus whether any record inside
/// carried the RELIABLE flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub reliable: bool,
}

/// Streams records into MTU-budgeted envelopes.
#[derive(Debug)]
pub struct EnvelopeBuilder {
    budget: usize,
    current: Vec<u8>,
    current_reliable: bool,
    sealed: Vec<Envelope>,
    index: Vec<RecordIndexEntry>,
}

impl EnvelopeBuilder {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            current: Vec::new(),
            current_reliable: false,
            sealed: Vec::new(),
            index: Vec::new(),
        }
    }

    fn seal_current(&mut self) {
        if !self.current.is_empty() {
            self.sealed.push(Envelope {
                payload: std::mem::take(&mut self.current),
                reliable: self.current_reliable,
            });
            self.current_reliable = false;
        }
    }

    /// Encodes `record` and appends it to the in-progress envelope, sealing
    /// the current one first if it would overflow the budget. Fails with
    /// [`TransportError::RecordTooLarge`] if the record alone exceeds the
    /// budget — the caller routes it to the fragmenter instead.
    pub fn add(&mut self, record: &Record, reliable: bool) -> Result<(), TransportError> {
        let encoded = record.encode(reliable);

        if encoded.len() > self.budget {
            return Err(TransportError::RecordTooLarge {
                size: encoded.len(),
                budget: self.budget,
            });
        }

        if self.current.len() + encoded.len() > self.budget && !self.current.is_empty() {
            self.seal_current();
        }

        self.index.push(RecordIndexEntry {
            envelope_idx: self.sealed.len(),
            type_code: record.type_code(),
            size: encoded.len(),
        });
        self.current.extend_from_slice(&encoded);
        if reliable {
            self.current_reliable = true;
        }
        Ok(())
    }

    /// Seals any open envelope and returns everything built so far,
    /// resetting the builder for the next tick.
    pub fn finish(&mut self) -> (Vec<Envelope>, Vec<RecordIndexEntry>) {
        self.seal_current();
        (std::mem::take(&mut self.sealed), std::mem::take(&mut self.index))
    }
}

/// Iterates a packet payload, decoding successive record TLVs.
pub struct EnvelopeOpener;

impl EnvelopeOpener {
    /// Decodes every record in `payload`. Returns `None` — the caller drops
    /// the whole envelope — if any record header is
    /// malformed or its type code is unrecognized.
    pub fn open(payload: &[u8]) -> Option<Vec<Record>> {
        let mut records = Vec::new();
        let mut rest = payload;
        while !rest.is_empty() {
            let (header, body, tail) = RecordHeader::decode(rest)?;
            records.push(Record::decode(header.type_code, body)?);
            rest = tail;
        }
        Some(records)
    }
}
