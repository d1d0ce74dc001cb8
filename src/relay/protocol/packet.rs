// ---- Public packet enum ---------------------------------------------------

use bytes::Bytes;

use crate::relay::protocol::{PacketType, UserName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    // Identity claim (client -> server)
    Identity {
        username: UserName,
    },

    // Chat
    OutgoingMessage {
        /// None means broadcast to everyone else.
        recipient: Option<UserName>,
        text: String,
    },
    IncomingMessage {
        /// None for relayed system text without an author.
        sender: Option<UserName>,
        text: String,
    },
    Announcement {
        text: String,
    },

    // Shared files
    FileListRequest,
    FileList {
        filenames: Vec<String>,
    },
    DownloadRequest {
        filename: String,
    },
    Download {
        filename: String,
        bytes: Bytes,
    },

    // Identity claim rejection (server -> client)
    DuplicateUsername {
        current_users: Vec<UserName>,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        use Packet::*;
        match self {
            Identity { .. } => PacketType::Identity,
            OutgoingMessage { .. } => PacketType::OutgoingMessage,
            IncomingMessage { .. } => PacketType::IncomingMessage,
            Announcement { .. } => PacketType::Announcement,
            FileListRequest => PacketType::FileListRequest,
            FileList { .. } => PacketType::FileList,
            DownloadRequest { .. } => PacketType::DownloadRequest,
            Download { .. } => PacketType::Download,
            DuplicateUsername { .. } => PacketType::DuplicateUsername,
        }
    }

    /// Short variant name for logging. Never includes payload text.
    pub fn name(&self) -> &'static str {
        use Packet::*;
        match self {
            Identity { .. } => "Identity",
            OutgoingMessage { .. } => "OutgoingMessage",
            IncomingMessage { .. } => "IncomingMessage",
            Announcement { .. } => "Announcement",
            FileListRequest => "FileListRequest",
            FileList { .. } => "FileList",
            DownloadRequest { .. } => "DownloadRequest",
            Download { .. } => "Download",
            DuplicateUsername { .. } => "DuplicateUsername",
        }
    }
}
