use crate::relay::protocol::Packet;

/// Internal identifier for a connected client (one TCP connection).
/// Doubles as the poll token value for that connection's socket.
pub type ConnId = u64;

/// A packet the server wants to send to one connection.
#[derive(Debug)]
pub struct OutgoingPacket {
    pub conn_id_target: ConnId,
    pub packet: Packet,
}
