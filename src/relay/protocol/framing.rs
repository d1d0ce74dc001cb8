use std::io::{self, Read, Write};
use std::mem;

use super::{FrameError, HEADER_SIZE, Header, Packet, decode_header, decode_packet, encode_packet};

// ---- Blocking helpers -----------------------------------------------------

/// Write a single complete frame (header + payload) to a blocking stream.
pub fn write_frame<W: Write>(w: &mut W, packet: &Packet) -> Result<(), FrameError> {
    let frame = encode_packet(packet)?;
    w.write_all(&frame)?; // io::Error -> FrameError::Io
    w.flush()?;
    Ok(())
}

/// Read a single frame from a blocking stream.
///
/// The payload length cap is enforced by header decoding.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Packet, FrameError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    r.read_exact(&mut header_bytes)?;

    let header = decode_header(&header_bytes)?; // ProtoError -> FrameError::Proto

    let mut payload = vec![0u8; header.payload_len];
    r.read_exact(&mut payload)?;

    Ok(decode_packet(&header, payload)?)
}

// ---- Incremental reader for non-blocking streams --------------------------

/// Outcome of one [`FrameReader::read_frame`] call.
#[derive(Debug)]
pub enum FrameProgress {
    /// One complete frame was assembled and decoded.
    Frame(Packet),
    /// No more bytes available right now; call again on the next readiness.
    WouldBlock,
    /// The peer closed the stream (clean EOF or mid-frame).
    Closed,
}

enum Step {
    Complete,
    WouldBlock,
    Closed,
}

/// Assembles frames from a non-blocking stream across readiness events.
///
/// A partial header or payload is kept between calls, so short reads are
/// never mistaken for complete frames.
#[derive(Debug)]
pub struct FrameReader {
    header_buf: [u8; HEADER_SIZE],
    header_filled: usize,
    header: Option<Header>,
    payload: Vec<u8>,
    payload_filled: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            header_buf: [0u8; HEADER_SIZE],
            header_filled: 0,
            header: None,
            payload: Vec::new(),
            payload_filled: 0,
        }
    }

    /// Pump bytes from `r` until one complete frame is out, the stream would
    /// block, or the peer closes.
    pub fn read_frame<R: Read>(&mut self, r: &mut R) -> Result<FrameProgress, FrameError> {
        loop {
            if self.header.is_none() {
                match read_some(r, &mut self.header_buf, &mut self.header_filled)? {
                    Step::WouldBlock => return Ok(FrameProgress::WouldBlock),
                    Step::Closed => return Ok(FrameProgress::Closed),
                    Step::Complete => {
                        let header = decode_header(&self.header_buf)?;
                        self.payload = vec![0u8; header.payload_len];
                        self.payload_filled = 0;
                        self.header = Some(header);
                    }
                }
                continue;
            }

            match read_some(r, &mut self.payload, &mut self.payload_filled)? {
                Step::WouldBlock => return Ok(FrameProgress::WouldBlock),
                Step::Closed => return Ok(FrameProgress::Closed),
                Step::Complete => {
                    if let Some(header) = self.header.take() {
                        let payload = mem::take(&mut self.payload);
                        self.header_filled = 0;
                        self.payload_filled = 0;
                        let packet = decode_packet(&header, payload)?;
                        return Ok(FrameProgress::Frame(packet));
                    }
                }
            }
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull bytes into `buf[*filled..]` until full, EOF, or `WouldBlock`.
fn read_some<R: Read>(r: &mut R, buf: &mut [u8], filled: &mut usize) -> Result<Step, FrameError> {
    while *filled < buf.len() {
        match r.read(&mut buf[*filled..]) {
            Ok(0) => return Ok(Step::Closed),
            Ok(n) => *filled += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Step::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Step::Complete)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::relay::protocol::ProtoError;
    use std::collections::VecDeque;

    enum Feed {
        Bytes(Vec<u8>),
        Block,
    }

    /// Read implementation that serves scripted chunks, interleaving
    /// `WouldBlock` like a real non-blocking socket. Exhaustion reads as EOF.
    struct ScriptedReader {
        feeds: VecDeque<Feed>,
    }

    impl ScriptedReader {
        fn new(feeds: Vec<Feed>) -> Self {
            Self {
                feeds: feeds.into(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.feeds.pop_front() {
                Some(Feed::Bytes(b)) => {
                    let n = b.len().min(buf.len());
                    buf[..n].copy_from_slice(&b[..n]);
                    if n < b.len() {
                        self.feeds.push_front(Feed::Bytes(b[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Feed::Block) => Err(io::ErrorKind::WouldBlock.into()),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn blocking_roundtrip_over_a_buffer() {
        let packet = Packet::OutgoingMessage {
            recipient: Some("bob".into()),
            text: "hello".into(),
        };

        let mut wire = Vec::new();
        write_frame(&mut wire, &packet).unwrap();

        let got = read_frame(&mut wire.as_slice()).unwrap();
        assert_eq!(got, packet);
    }

    #[test]
    fn frame_split_across_readiness_events_is_reassembled() {
        let packet = Packet::Announcement {
            text: "alice has joined the chat.".into(),
        };
        let frame = encode_packet(&packet).unwrap();

        // Header split mid-way, then a block, then the rest in two pieces.
        let mut reader = FrameReader::new();
        let mut stream = ScriptedReader::new(vec![
            Feed::Bytes(frame[..50].to_vec()),
            Feed::Block,
            Feed::Bytes(frame[50..HEADER_SIZE + 3].to_vec()),
            Feed::Block,
            Feed::Bytes(frame[HEADER_SIZE + 3..].to_vec()),
        ]);

        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::WouldBlock => {}
            other => panic!("expected WouldBlock after partial header, got {:?}", other),
        }
        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::WouldBlock => {}
            other => panic!("expected WouldBlock after partial payload, got {:?}", other),
        }
        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Frame(got) => assert_eq!(got, packet),
            other => panic!("expected a complete frame, got {:?}", other),
        }
        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Closed => {}
            other => panic!("expected Closed at EOF, got {:?}", other),
        }
    }

    #[test]
    fn back_to_back_frames_come_out_one_at_a_time() {
        let first = Packet::Identity {
            username: "alice".into(),
        };
        let second = Packet::OutgoingMessage {
            recipient: None,
            text: "hi".into(),
        };

        let mut wire = encode_packet(&first).unwrap();
        wire.extend_from_slice(&encode_packet(&second).unwrap());

        let mut reader = FrameReader::new();
        let mut stream = ScriptedReader::new(vec![Feed::Bytes(wire)]);

        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Frame(got) => assert_eq!(got, first),
            other => panic!("expected first frame, got {:?}", other),
        }
        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Frame(got) => assert_eq!(got, second),
            other => panic!("expected second frame, got {:?}", other),
        }
        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Closed => {}
            other => panic!("expected Closed at EOF, got {:?}", other),
        }
    }

    #[test]
    fn eof_mid_frame_reports_closed() {
        let packet = Packet::Announcement {
            text: "going away".into(),
        };
        let frame = encode_packet(&packet).unwrap();

        let mut reader = FrameReader::new();
        let mut stream = ScriptedReader::new(vec![Feed::Bytes(frame[..HEADER_SIZE + 2].to_vec())]);

        match reader.read_frame(&mut stream).unwrap() {
            FrameProgress::Closed => {}
            other => panic!("expected Closed on truncated stream, got {:?}", other),
        }
    }

    #[test]
    fn garbage_header_surfaces_a_protocol_error() {
        let mut reader = FrameReader::new();
        let mut stream = ScriptedReader::new(vec![Feed::Bytes(vec![0xAB; HEADER_SIZE])]);

        match reader.read_frame(&mut stream) {
            Err(FrameError::Proto(ProtoError::BadVersion(0xAB))) => {}
            other => panic!("expected BadVersion, got {:?}", other),
        }
    }
}
