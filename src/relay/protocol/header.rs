use byteorder::{BigEndian, ByteOrder};

use crate::relay::protocol::{
    HEADER_SIZE, MAX_PAYLOAD_LEN, PARAMS_SIZE, PROTO_VERSION, PacketType, ProtoError,
};

// ---- Header params --------------------------------------------------------

/// Short `key=value` pairs carried in the header's fixed text region.
///
/// Keys in use: `username`, `recipient`, `sender`, `filename`. Unknown keys
/// are preserved on decode and ignored by packet decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one pair.
    ///
    /// Values must stay representable in the single-line text region, so the
    /// delimiters `=` and `;` and control characters are rejected.
    pub fn push(&mut self, key: &'static str, value: &str) -> Result<(), ProtoError> {
        if value.chars().any(|c| c == '=' || c == ';' || c.is_control()) {
            return Err(ProtoError::InvalidFormat(
                "param value contains reserved character",
            ));
        }
        self.0.push((key.to_owned(), value.to_owned()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like `get`, but treats an empty value as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }

    fn parse(text: &str) -> Result<Params, ProtoError> {
        let mut params = Params::new();
        for seg in text.split(';') {
            if seg.is_empty() {
                continue;
            }
            let Some(pos) = seg.find('=') else {
                return Err(ProtoError::InvalidFormat("header param without '='"));
            };
            let value = &seg[pos + 1..];
            if value.contains('=') {
                return Err(ProtoError::InvalidFormat("header param value contains '='"));
            }
            params.0.push((seg[..pos].to_owned(), value.to_owned()));
        }
        Ok(params)
    }
}

// ---- Fixed-width header ---------------------------------------------------

/// Decoded header. The payload is read separately once `payload_len` is known.
#[derive(Debug)]
pub struct Header {
    pub packet_type: PacketType,
    pub payload_len: usize,
    pub params: Params,
}

/// Encode a full header: [ver][type][flags u16=0][len u32][params, NUL-padded].
///
/// `payload_len` is the exact number of payload bytes that will follow the
/// header on the wire.
pub fn encode_header(
    packet_type: PacketType,
    payload_len: usize,
    params: &Params,
) -> Result<[u8; HEADER_SIZE], ProtoError> {
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtoError::TooLarge);
    }

    let text = params.encode();
    if text.len() > PARAMS_SIZE {
        return Err(ProtoError::ParamsTooLong {
            max: PARAMS_SIZE,
            actual: text.len(),
        });
    }

    let mut header = [0u8; HEADER_SIZE];
    header[0] = PROTO_VERSION;
    header[1] = packet_type.as_u8();
    BigEndian::write_u16(&mut header[2..4], 0); // flags
    BigEndian::write_u32(&mut header[4..8], payload_len as u32);
    header[8..8 + text.len()].copy_from_slice(text.as_bytes());

    Ok(header)
}

/// Parse a header, enforcing version, known type, and the payload length cap.
pub fn decode_header(buf: &[u8; HEADER_SIZE]) -> Result<Header, ProtoError> {
    if buf[0] != PROTO_VERSION {
        return Err(ProtoError::BadVersion(buf[0]));
    }
    let packet_type = PacketType::from_u8(buf[1])?;
    // flags ignored for now
    let payload_len = BigEndian::read_u32(&buf[4..8]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtoError::TooLarge);
    }

    // Params region runs to the first NUL; anything past it is padding.
    let region = &buf[8..];
    let end = region.iter().position(|&b| b == 0).unwrap_or(PARAMS_SIZE);
    let text = std::str::from_utf8(&region[..end]).map_err(|_| ProtoError::InvalidUtf8)?;
    if text.chars().any(char::is_control) {
        return Err(ProtoError::InvalidFormat("control character in header params"));
    }
    let params = Params::parse(text)?;

    Ok(Header {
        packet_type,
        payload_len,
        params,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn header_roundtrip_preserves_type_len_and_params() {
        let mut params = Params::new();
        params.push("username", "alice").unwrap();
        params.push("filename", "notes.txt").unwrap();

        let bytes = encode_header(PacketType::Download, 42, &params).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.packet_type, PacketType::Download);
        assert_eq!(header.payload_len, 42);
        assert_eq!(header.params.get("username"), Some("alice"));
        assert_eq!(header.params.get("filename"), Some("notes.txt"));
        assert_eq!(header.params.get("recipient"), None);
    }

    #[test]
    fn empty_params_roundtrip() {
        let bytes = encode_header(PacketType::FileListRequest, 0, &Params::new()).unwrap();
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.packet_type, PacketType::FileListRequest);
        assert_eq!(header.payload_len, 0);
        assert!(header.params.is_empty());
    }

    #[test]
    fn params_over_region_capacity_fail_to_encode() {
        let mut params = Params::new();
        params.push("username", &"x".repeat(PARAMS_SIZE)).unwrap();

        match encode_header(PacketType::Identity, 0, &params) {
            Err(ProtoError::ParamsTooLong { max, actual }) => {
                assert_eq!(max, PARAMS_SIZE);
                assert!(actual > max);
            }
            other => panic!("expected ParamsTooLong, got {:?}", other),
        }
    }

    #[test]
    fn reserved_characters_are_rejected_at_push() {
        let mut params = Params::new();
        assert!(params.push("username", "a=b").is_err());
        assert!(params.push("username", "a;b").is_err());
        assert!(params.push("username", "a\nb").is_err());
        assert!(params.push("username", "a b").is_ok());
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let mut bytes = encode_header(PacketType::Identity, 0, &Params::new()).unwrap();
        bytes[1] = 0xEE;
        match decode_header(&bytes) {
            Err(ProtoError::UnknownType(0xEE)) => {}
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = encode_header(PacketType::Identity, 0, &Params::new()).unwrap();
        bytes[0] = PROTO_VERSION + 1;
        match decode_header(&bytes) {
            Err(ProtoError::BadVersion(v)) => assert_eq!(v, PROTO_VERSION + 1),
            other => panic!("expected BadVersion, got {:?}", other),
        }
    }

    #[test]
    fn declared_len_over_cap_is_rejected() {
        let mut bytes = encode_header(PacketType::Download, 0, &Params::new()).unwrap();
        BigEndian::write_u32(&mut bytes[4..8], u32::MAX);
        match decode_header(&bytes) {
            Err(ProtoError::TooLarge) => {}
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn malformed_param_segment_is_rejected() {
        let mut bytes = encode_header(PacketType::Identity, 0, &Params::new()).unwrap();
        bytes[8..8 + 7].copy_from_slice(b"no-sign");
        match decode_header(&bytes) {
            Err(ProtoError::InvalidFormat(_)) => {}
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }
}
