use bytes::Bytes;

use super::{HEADER_SIZE, Header, Packet, PacketType, Params, ProtoError, encode_header};

// ---- Encode to frame bytes ------------------------------------------------

/// Encode one packet into a complete frame (header + payload).
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtoError> {
    use Packet::*;

    let mut params = Params::new();
    let joined;

    let payload: &[u8] = match packet {
        Identity { username } => {
            params.push("username", username)?;
            &[]
        }

        OutgoingMessage { recipient, text } => {
            if let Some(recipient) = recipient {
                params.push("recipient", recipient)?;
            }
            text.as_bytes()
        }
        IncomingMessage { sender, text } => {
            if let Some(sender) = sender {
                params.push("sender", sender)?;
            }
            text.as_bytes()
        }
        Announcement { text } => text.as_bytes(),

        FileListRequest => &[],
        FileList { filenames } => {
            joined = filenames.join("\n");
            joined.as_bytes()
        }
        DownloadRequest { filename } => {
            params.push("filename", filename)?;
            &[]
        }
        Download { filename, bytes } => {
            params.push("filename", filename)?;
            bytes.as_ref()
        }

        DuplicateUsername { current_users } => {
            joined = current_users.join("\n");
            joined.as_bytes()
        }
    };

    let header = encode_header(packet.packet_type(), payload.len(), &params)?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

// ---- Decode from header + payload bytes -----------------------------------

/// Decode a packet from a parsed header and its complete payload.
///
/// The caller must have read exactly `header.payload_len` bytes.
pub fn decode_packet(header: &Header, payload: Vec<u8>) -> Result<Packet, ProtoError> {
    use Packet::*;

    debug_assert_eq!(header.payload_len, payload.len());

    // Header-only types must arrive without a payload.
    if matches!(
        header.packet_type,
        PacketType::Identity | PacketType::FileListRequest | PacketType::DownloadRequest
    ) && !payload.is_empty()
    {
        return Err(ProtoError::InvalidFormat(
            "unexpected payload for header-only packet",
        ));
    }

    let packet = match header.packet_type {
        PacketType::Identity => {
            let username = require_param(header, "username")?;
            Identity { username }
        }

        PacketType::OutgoingMessage => OutgoingMessage {
            recipient: header.params.get_non_empty("recipient").map(str::to_owned),
            text: text_payload(payload)?,
        },
        PacketType::IncomingMessage => IncomingMessage {
            sender: header.params.get_non_empty("sender").map(str::to_owned),
            text: text_payload(payload)?,
        },
        PacketType::Announcement => Announcement {
            text: text_payload(payload)?,
        },

        PacketType::FileListRequest => FileListRequest,
        PacketType::FileList => FileList {
            filenames: lines_payload(payload)?,
        },
        PacketType::DownloadRequest => {
            let filename = require_param(header, "filename")?;
            DownloadRequest { filename }
        }
        PacketType::Download => {
            let filename = require_param(header, "filename")?;
            Download {
                filename,
                bytes: Bytes::from(payload),
            }
        }

        PacketType::DuplicateUsername => DuplicateUsername {
            current_users: lines_payload(payload)?,
        },
    };

    Ok(packet)
}

// ---- Payload helpers ------------------------------------------------------

fn require_param(header: &Header, key: &'static str) -> Result<String, ProtoError> {
    header
        .params
        .get_non_empty(key)
        .map(str::to_owned)
        .ok_or(ProtoError::MissingParam(key))
}

fn text_payload(payload: Vec<u8>) -> Result<String, ProtoError> {
    String::from_utf8(payload).map_err(|_| ProtoError::InvalidUtf8)
}

fn lines_payload(payload: Vec<u8>) -> Result<Vec<String>, ProtoError> {
    let text = text_payload(payload)?;
    Ok(text.split_terminator('\n').map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::relay::protocol::decode_header;

    fn roundtrip(packet: &Packet) -> Packet {
        let frame = encode_packet(packet).unwrap();
        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&frame[..HEADER_SIZE]);

        let header = decode_header(&header_bytes).unwrap();
        assert_eq!(header.payload_len, frame.len() - HEADER_SIZE);

        decode_packet(&header, frame[HEADER_SIZE..].to_vec()).unwrap()
    }

    #[test]
    fn identity_travels_in_the_header_alone() {
        let packet = Packet::Identity {
            username: "alice".into(),
        };
        let frame = encode_packet(&packet).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn direct_and_broadcast_messages_keep_their_recipient() {
        let direct = Packet::OutgoingMessage {
            recipient: Some("bob".into()),
            text: "hi bob".into(),
        };
        let broadcast = Packet::OutgoingMessage {
            recipient: None,
            text: "hi all".into(),
        };
        assert_eq!(roundtrip(&direct), direct);
        assert_eq!(roundtrip(&broadcast), broadcast);
    }

    #[test]
    fn download_preserves_raw_bytes() {
        let packet = Packet::Download {
            filename: "blob.bin".into(),
            bytes: Bytes::from_static(&[0x00, 0xFF, 0x7F, 0x80, 0x0A]),
        };
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn duplicate_username_carries_the_user_list() {
        let packet = Packet::DuplicateUsername {
            current_users: vec!["alice".into(), "bob".into()],
        };
        assert_eq!(roundtrip(&packet), packet);

        let empty = Packet::FileList { filenames: vec![] };
        assert_eq!(roundtrip(&empty), empty);
    }

    #[test]
    fn payload_on_header_only_packet_is_rejected() {
        let frame = encode_packet(&Packet::Identity {
            username: "mallory".into(),
        })
        .unwrap();
        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&frame[..HEADER_SIZE]);
        let header = decode_header(&header_bytes).unwrap();

        match decode_packet(&header, b"sneaky".to_vec()) {
            Err(ProtoError::InvalidFormat(_)) => {}
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn non_utf8_text_payload_is_rejected() {
        let frame = encode_packet(&Packet::Announcement {
            text: "placeholder".into(),
        })
        .unwrap();
        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&frame[..HEADER_SIZE]);
        let mut header = decode_header(&header_bytes).unwrap();
        header.payload_len = 2;

        match decode_packet(&header, vec![0xC0, 0xAF]) {
            Err(ProtoError::InvalidUtf8) => {}
            other => panic!("expected InvalidUtf8, got {:?}", other),
        }
    }
}
