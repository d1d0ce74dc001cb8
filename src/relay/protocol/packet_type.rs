// ---- Packet type byte -----------------------------------------------------

use crate::relay::protocol::ProtoError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    Identity = 1,
    OutgoingMessage = 2,
    IncomingMessage = 3,
    Announcement = 4,
    FileListRequest = 5,
    FileList = 6,
    DownloadRequest = 7,
    Download = 8,
    DuplicateUsername = 9,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Result<PacketType, ProtoError> {
        use PacketType::*;
        match v {
            1 => Ok(Identity),
            2 => Ok(OutgoingMessage),
            3 => Ok(IncomingMessage),
            4 => Ok(Announcement),
            5 => Ok(FileListRequest),
            6 => Ok(FileList),
            7 => Ok(DownloadRequest),
            8 => Ok(Download),
            9 => Ok(DuplicateUsername),
            other => Err(ProtoError::UnknownType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
