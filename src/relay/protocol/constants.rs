/// Protocol constants and frame layout.
///
/// Header (fixed 128 bytes):
///   [ver: u8][packet_type: u8][flags: u16][payload_len: u32][params: 120 bytes]
/// Payload:
///   exactly `payload_len` bytes, up to `MAX_PAYLOAD_LEN`.
///
/// The params region holds short `key=value` pairs joined by `;`, NUL-padded
/// to its full width.
pub const PROTO_VERSION: u8 = 1;

/// Total header width on the wire. Never varies with content.
pub const HEADER_SIZE: usize = 128;

/// Width of the textual params region at the end of the header.
pub const PARAMS_SIZE: usize = HEADER_SIZE - 8;

/// Maximum allowed payload size for a frame (to avoid OOM).
/// Large enough for whole-buffer file downloads.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1_048_576; // 16 MiB
