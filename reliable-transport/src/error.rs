use thiserror::Error;

/// Errors that can legitimately cross a public API boundary.
///
/// Per the cardinal rule of the error design: no error crosses
/// [`crate::connection::ReliableConnection::tick`] except a fatal socket or
/// configuration fault. Everything else (malformed wire input, over-retry,
/// ring-buffer backpressure, fragment reassembly pressure) is swallowed into
/// [`crate::events::Event`] instead of an `Err`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("a single record of {size} bytes cannot fit in the {budget}-byte envelope budget")]
    RecordTooLarge { size: usize, budget: usize },

    #[error("mtu {mtu} is too small to hold a fragment header ({header_size} bytes)")]
    InvalidMtu { mtu: usize, header_size: usize },

    #[error("socket I/O failure: {0}")]
    Io(#[from] std::io::Error),
}
