use std::fs;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use crate::log::LogSink;
use crate::relay::protocol::{FrameError, Packet, UserName, read_frame, write_frame};
use crate::relay_client::errors::ClientError;
use crate::relay_client::events::ClientEvent;
use crate::{sink_debug, sink_error, sink_info, sink_warn};

/// Outcome of one username claim.
#[derive(Debug)]
pub enum ClaimResult {
    /// The server took the name; `welcome` is its greeting line.
    Accepted { welcome: String },
    /// Somebody already holds the name. Pick another and try again.
    Taken { current_users: Vec<UserName> },
}

/// A connection that has not secured a username yet.
///
/// The server answers each `Identity` claim with either a welcome or a
/// duplicate-username notice, and nothing else reaches an unidentified
/// connection unasked, so the handshake can stay synchronous. Call
/// [`claim_username`](Self::claim_username) until it reports
/// [`ClaimResult::Accepted`], then [`start`](Self::start).
pub struct PendingClient {
    stream: TcpStream,
    save_dir: PathBuf,
    accepted: Option<UserName>,
    log: Arc<dyn LogSink>,
}

impl PendingClient {
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        save_dir: impl Into<PathBuf>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        if let Ok(peer) = stream.peer_addr() {
            sink_info!(log, "connected to {}", peer);
        }
        Ok(Self {
            stream,
            save_dir: save_dir.into(),
            accepted: None,
            log,
        })
    }

    /// Offer a username to the server and wait for its verdict.
    pub fn claim_username(&mut self, username: &str) -> Result<ClaimResult, ClientError> {
        write_frame(
            &mut self.stream,
            &Packet::Identity {
                username: username.to_string(),
            },
        )?;

        match read_frame(&mut self.stream)? {
            Packet::Announcement { text } => {
                sink_info!(self.log, "identified as {}", username);
                self.accepted = Some(username.to_string());
                Ok(ClaimResult::Accepted { welcome: text })
            }
            Packet::DuplicateUsername { current_users } => {
                sink_debug!(self.log, "username {} is taken", username);
                Ok(ClaimResult::Taken { current_users })
            }
            other => Err(ClientError::UnexpectedReply(other.name())),
        }
    }

    /// Split off the reader thread and hand back the sending half.
    ///
    /// Downloads are saved under `<save_dir>/<username>/`.
    pub fn start(self) -> Result<(RelayClient, mpsc::Receiver<ClientEvent>), ClientError> {
        let Self {
            stream,
            save_dir,
            accepted,
            log,
        } = self;
        let username = accepted.ok_or(ClientError::NoUsername)?;

        let download_dir = save_dir.join(&username);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>();

        let read_stream = stream.try_clone()?;

        // READER THREAD: socket -> ClientEvent
        {
            let log = log.clone();
            thread::Builder::new()
                .name("relay-client-reader".into())
                .spawn(move || run_reader(read_stream, download_dir, event_tx, log))?;
        }

        Ok((
            RelayClient {
                stream,
                username,
                log,
            },
            event_rx,
        ))
    }
}

/// The identified, running client. Sends only; received traffic comes
/// out of the event receiver returned by [`PendingClient::start`].
pub struct RelayClient {
    stream: TcpStream,
    username: UserName,
    log: Arc<dyn LogSink>,
}

impl RelayClient {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Chat text for everyone else.
    pub fn send_broadcast(&mut self, text: &str) -> Result<(), ClientError> {
        self.send(&Packet::OutgoingMessage {
            recipient: None,
            text: text.to_string(),
        })
    }

    /// Chat text for one user only.
    pub fn send_direct(&mut self, recipient: &str, text: &str) -> Result<(), ClientError> {
        self.send(&Packet::OutgoingMessage {
            recipient: Some(recipient.to_string()),
            text: text.to_string(),
        })
    }

    pub fn request_file_list(&mut self) -> Result<(), ClientError> {
        self.send(&Packet::FileListRequest)
    }

    pub fn request_download(&mut self, filename: &str) -> Result<(), ClientError> {
        self.send(&Packet::DownloadRequest {
            filename: filename.to_string(),
        })
    }

    /// Drop the connection; the reader thread winds down on EOF.
    pub fn disconnect(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        write_frame(&mut self.stream, packet)?;
        sink_debug!(self.log, "sent {}", packet.name());
        Ok(())
    }
}

fn run_reader(
    mut stream: TcpStream,
    download_dir: PathBuf,
    events: mpsc::Sender<ClientEvent>,
    log: Arc<dyn LogSink>,
) {
    loop {
        match read_frame(&mut stream) {
            Ok(packet) => {
                let event = match packet {
                    Packet::IncomingMessage { sender, text } => {
                        ClientEvent::Message { sender, text }
                    }
                    Packet::Announcement { text } => ClientEvent::Announcement(text),
                    Packet::FileList { filenames } => ClientEvent::FileList(filenames),
                    Packet::Download { filename, bytes } => {
                        match save_download(&download_dir, &filename, &bytes) {
                            Ok(path) => ClientEvent::Downloaded { filename, path },
                            Err(e) => {
                                sink_error!(log, "failed to save {}: {}", filename, e);
                                continue;
                            }
                        }
                    }
                    other => {
                        sink_warn!(log, "ignoring unexpected {} from server", other.name());
                        continue;
                    }
                };
                if events.send(event).is_err() {
                    // Terminal loop is gone; nobody left to tell.
                    return;
                }
            }
            Err(FrameError::Io(e)) => {
                sink_info!(log, "server connection closed: {}", e);
                let _ = events.send(ClientEvent::Disconnected);
                return;
            }
            Err(FrameError::Proto(e)) => {
                sink_warn!(log, "protocol error from server: {:?}", e);
                let _ = events.send(ClientEvent::Disconnected);
                return;
            }
        }
    }
}

/// Write a downloaded file under `dir`, trusting only the final path
/// component of the server-supplied name.
fn save_download(dir: &Path, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty file name"))?;
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    Ok(path)
}
