use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::log::{LogSink, NoopLogSink};
use crate::relay::files::FileStore;
use crate::relay::protocol::{Packet, UserName};
use crate::relay::registry::{ClaimOutcome, Registry};
use crate::relay::router::Router;
use crate::relay::types::{ConnId, OutgoingPacket};
use crate::{sink_debug, sink_error, sink_info, sink_warn};

/// Socket-free relay core.
///
/// The event loop feeds it decoded packets and connection lifecycle
/// events; everything it wants sent lands in the router's outboxes and
/// is picked up via [`Server::drain_outgoing`].
pub struct Server {
    registry: Registry,
    router: Router,
    files: FileStore,
    log: Arc<dyn LogSink>,
}

impl Server {
    pub fn new(files: FileStore) -> Self {
        Self::with_log(files, Arc::new(NoopLogSink))
    }

    pub fn with_log(files: FileStore, log: Arc<dyn LogSink>) -> Self {
        Self {
            registry: Registry::new(),
            router: Router::new(),
            files,
            log,
        }
    }

    /// Returns Some(username) if the connection has identified, None otherwise.
    fn require_identified(&self, conn_id: ConnId) -> Option<UserName> {
        self.registry.username_for(conn_id).map(str::to_owned)
    }

    /// Called when the event loop accepts a new connection.
    pub fn handle_connect(&mut self, conn_id: ConnId, addr: SocketAddr) {
        self.registry.register(conn_id, addr);
        self.router.register_conn(conn_id);
        sink_info!(self.log, "conn {} connected from {}", conn_id, addr);
    }

    /// Main entrypoint: handle a packet from a connection.
    pub fn handle(&mut self, from: ConnId, packet: Packet) {
        match packet {
            Packet::Identity { username } => self.handle_identity(from, username),

            Packet::OutgoingMessage { recipient, text } => self.handle_chat(from, recipient, text),

            Packet::FileListRequest => self.handle_file_list(from),

            Packet::DownloadRequest { filename } => self.handle_download(from, filename),

            Packet::IncomingMessage { .. }
            | Packet::Announcement { .. }
            | Packet::FileList { .. }
            | Packet::Download { .. }
            | Packet::DuplicateUsername { .. } => {
                sink_warn!(
                    self.log,
                    "ignoring server-only {} from conn {}",
                    packet.name(),
                    from
                );
            }
        }
    }

    /// Called when a connection closes, on any path.
    ///
    /// Frees the username (if any) for reuse and tells the remaining
    /// users who left.
    pub fn handle_disconnect(&mut self, conn_id: ConnId) {
        self.router.unregister_conn(conn_id);

        match self.registry.unregister(conn_id) {
            Some(username) => {
                sink_info!(self.log, "conn {} ({}) disconnected", conn_id, username);
                let note = Packet::Announcement {
                    text: format!("{} has left the chat.", username),
                };
                self.router.broadcast(&self.registry, note, None);
            }
            None => {
                sink_debug!(self.log, "conn {} disconnected before identifying", conn_id);
            }
        }
    }

    /// Drain everything the handlers queued, for the event loop to
    /// encode and write.
    pub fn drain_outgoing(&mut self) -> Vec<OutgoingPacket> {
        self.router.drain()
    }

    /// Read-only view of the connection registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ---- Individual handlers ---------------------------------------------

    fn handle_identity(&mut self, conn_id: ConnId, username: UserName) {
        match self.registry.claim_username(conn_id, &username) {
            ClaimOutcome::Accepted => {
                sink_info!(self.log, "conn {} identified as {}", conn_id, username);

                self.router.send_to(
                    conn_id,
                    Packet::Announcement {
                        text: format!("Welcome, {}!", username),
                    },
                );
                let joined = Packet::Announcement {
                    text: format!("{} has joined the chat.", username),
                };
                self.router
                    .broadcast(&self.registry, joined, Some(username.as_str()));
            }
            ClaimOutcome::Rejected { current_users } => {
                sink_warn!(
                    self.log,
                    "conn {} claimed unavailable username {}",
                    conn_id,
                    username
                );
                self.router
                    .send_to(conn_id, Packet::DuplicateUsername { current_users });
            }
        }
    }

    fn handle_chat(&mut self, from: ConnId, recipient: Option<UserName>, text: String) {
        let Some(sender) = self.require_identified(from) else {
            sink_warn!(self.log, "unidentified conn {} attempted to chat", from);
            return;
        };

        let delivery = Packet::IncomingMessage {
            sender: Some(sender.clone()),
            text,
        };

        match recipient {
            Some(recipient) => {
                if self.router.unicast(&self.registry, &recipient, delivery) {
                    sink_debug!(self.log, "direct message from {} to {}", sender, recipient);
                } else {
                    sink_warn!(
                        self.log,
                        "conn {} ({}) messaged unavailable recipient {}",
                        from,
                        sender,
                        recipient
                    );
                }
            }
            None => {
                sink_debug!(self.log, "broadcast message from {}", sender);
                self.router
                    .broadcast(&self.registry, delivery, Some(sender.as_str()));
            }
        }
    }

    fn handle_file_list(&mut self, conn_id: ConnId) {
        match self.files.list() {
            Ok(filenames) => {
                sink_debug!(
                    self.log,
                    "conn {} listed {} file(s)",
                    conn_id,
                    filenames.len()
                );
                self.router.send_to(conn_id, Packet::FileList { filenames });
            }
            Err(e) => {
                sink_error!(
                    self.log,
                    "failed to list files in {}: {}",
                    self.files.dir().display(),
                    e
                );
            }
        }
    }

    fn handle_download(&mut self, conn_id: ConnId, filename: String) {
        match self.files.read(&filename) {
            Ok(bytes) => {
                sink_info!(
                    self.log,
                    "serving {} ({} bytes) to conn {}",
                    filename,
                    bytes.len(),
                    conn_id
                );
                self.router
                    .send_to(conn_id, Packet::Download { filename, bytes });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                sink_warn!(
                    self.log,
                    "conn {} requested missing file {}",
                    conn_id,
                    filename
                );
            }
            Err(e) => {
                sink_error!(self.log, "failed to read {}: {}", filename, e);
            }
        }
    }
}
