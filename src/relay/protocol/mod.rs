pub mod codec;
pub mod constants;
pub mod errors;
pub mod framing;
pub mod header;
pub mod packet;
pub mod packet_type;

pub use codec::{decode_packet, encode_packet};
pub use constants::{HEADER_SIZE, MAX_PAYLOAD_LEN, PARAMS_SIZE, PROTO_VERSION};
pub use errors::{FrameError, ProtoError};
pub use framing::{FrameProgress, FrameReader, read_frame, write_frame};
pub use header::{Header, Params, decode_header, encode_header};
pub use packet::Packet;
pub use packet_type::PacketType;

// ---- Basic types ----------------------------------------------------------

pub type UserName = String;
