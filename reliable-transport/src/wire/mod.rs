//! Wire formats: packet, record, and fragment headers.

mod fragment;
mod packet;
mod record;

pub use fragment::{FragmentHeader, FRAGMENT_HEADER_SIZE};
pub use packet::{PacketFlags, PacketHeader, PACKET_HEADER_SIZE, PACKET_MAGIC, PACKET_VERSION};
pub use record::{RecordFlags, RecordHeader, RECORD_HEADER_SIZE};
