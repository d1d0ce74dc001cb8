use std::collections::{HashMap, VecDeque};

use crate::relay::protocol::Packet;
use crate::relay::registry::Registry;
use crate::relay::types::{ConnId, OutgoingPacket};

/// Router buffers outbound packets in per-connection outboxes.
///
/// It never touches sockets. The event loop drains it after every
/// dispatch and performs the actual writes, so a slow or vanished
/// recipient cannot abort delivery to the rest.
#[derive(Debug, Default)]
pub struct Router {
    outboxes: HashMap<ConnId, VecDeque<Packet>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            outboxes: HashMap::new(),
        }
    }

    /// Register a new connection with this Router.
    ///
    /// For now this just ensures an outbox exists.
    pub fn register_conn(&mut self, conn_id: ConnId) {
        self.outboxes.entry(conn_id).or_insert_with(VecDeque::new);
    }

    /// Drop a connection's outbox. Anything still queued is abandoned.
    pub fn unregister_conn(&mut self, conn_id: ConnId) {
        self.outboxes.remove(&conn_id);
    }

    /// Queue a packet straight to a connection, identified or not.
    ///
    /// Used for replies that must reach a connection before it has a
    /// username: welcome text, duplicate-username notices, file
    /// responses.
    pub fn send_to(&mut self, conn_id: ConnId, packet: Packet) {
        self.enqueue(conn_id, packet);
    }

    /// Queue a clone of `packet` for every identified connection,
    /// skipping the user named in `exclude` if any.
    ///
    /// Unidentified connections never receive broadcasts.
    pub fn broadcast(&mut self, registry: &Registry, packet: Packet, exclude: Option<&str>) {
        for (conn_id, name) in registry.identified() {
            if exclude == Some(name) {
                continue;
            }
            self.enqueue(conn_id, packet.clone());
        }
    }

    /// Queue a packet for the identified connection holding `username`.
    ///
    /// Returns false when nobody holds that name; the caller decides how
    /// loudly to report that.
    pub fn unicast(&mut self, registry: &Registry, username: &str, packet: Packet) -> bool {
        match registry.conn_id_for(username) {
            Some(conn_id) => {
                self.enqueue(conn_id, packet);
                true
            }
            None => false,
        }
    }

    /// Peek (non-destructive) at what is queued for a connection.
    /// Mostly helpful in tests.
    pub fn outgoing_for(&self, conn_id: ConnId) -> Vec<&Packet> {
        self.outboxes
            .get(&conn_id)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }

    /// Drain all pending outbound packets, FIFO per connection.
    pub fn drain(&mut self) -> Vec<OutgoingPacket> {
        let mut result = Vec::new();

        // Collect keys first to avoid borrowing issues.
        let conn_ids: Vec<ConnId> = self.outboxes.keys().copied().collect();

        for conn_id in conn_ids {
            if let Some(queue) = self.outboxes.remove(&conn_id) {
                for packet in queue {
                    result.push(OutgoingPacket {
                        conn_id_target: conn_id,
                        packet,
                    });
                }
            }
        }

        result
    }

    fn enqueue(&mut self, conn_id: ConnId, packet: Packet) {
        let queue = self.outboxes.entry(conn_id).or_insert_with(VecDeque::new);
        queue.push_back(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::registry::ClaimOutcome;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    /// Registry with alice on conn 1, bob on conn 2 and an unidentified
    /// conn 3.
    fn seeded_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(1, addr(1001));
        registry.register(2, addr(1002));
        registry.register(3, addr(1003));
        match registry.claim_username(1, "alice") {
            ClaimOutcome::Accepted => {}
            other => panic!("expected Accepted for alice, got {:?}", other),
        }
        match registry.claim_username(2, "bob") {
            ClaimOutcome::Accepted => {}
            other => panic!("expected Accepted for bob, got {:?}", other),
        }
        registry
    }

    #[test]
    fn broadcast_skips_sender_and_unidentified() {
        let registry = seeded_registry();
        let mut router = Router::new();
        router.register_conn(1);
        router.register_conn(2);
        router.register_conn(3);

        let note = Packet::Announcement {
            text: "alice has joined the chat.".to_string(),
        };
        router.broadcast(&registry, note.clone(), Some("alice"));

        assert!(router.outgoing_for(1).is_empty());
        assert!(router.outgoing_for(3).is_empty());

        let for_bob = router.outgoing_for(2);
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0], &note);
    }

    #[test]
    fn unicast_reports_unknown_recipient() {
        let registry = seeded_registry();
        let mut router = Router::new();

        let dm = Packet::IncomingMessage {
            sender: Some("alice".to_string()),
            text: "hi bob".to_string(),
        };
        assert!(router.unicast(&registry, "bob", dm.clone()));
        assert!(!router.unicast(&registry, "carol", dm));

        let for_bob = router.outgoing_for(2);
        assert_eq!(for_bob.len(), 1);
        match for_bob[0] {
            Packet::IncomingMessage { sender, text } => {
                assert_eq!(sender.as_deref(), Some("alice"));
                assert_eq!(text, "hi bob");
            }
            other => panic!("expected IncomingMessage, got {:?}", other),
        }
    }

    #[test]
    fn send_to_reaches_unidentified_conn() {
        let mut router = Router::new();
        router.register_conn(3);

        let notice = Packet::DuplicateUsername {
            current_users: vec!["alice".to_string(), "bob".to_string()],
        };
        router.send_to(3, notice.clone());

        let out = router.drain();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].conn_id_target, 3);
        assert_eq!(out[0].packet, notice);
    }

    #[test]
    fn drain_is_fifo_per_conn_and_empties_outboxes() {
        let mut router = Router::new();
        router.register_conn(1);

        router.send_to(
            1,
            Packet::Announcement {
                text: "first".to_string(),
            },
        );
        router.send_to(
            1,
            Packet::Announcement {
                text: "second".to_string(),
            },
        );

        let out = router.drain();
        assert_eq!(out.len(), 2);
        match (&out[0].packet, &out[1].packet) {
            (Packet::Announcement { text: a }, Packet::Announcement { text: b }) => {
                assert_eq!(a, "first");
                assert_eq!(b, "second");
            }
            other => panic!("expected two Announcements, got {:?}", other),
        }

        // After draining, nothing else should be pending.
        assert!(router.drain().is_empty());
    }

    #[test]
    fn unregister_abandons_queued_packets() {
        let mut router = Router::new();
        router.register_conn(1);
        router.send_to(
            1,
            Packet::Announcement {
                text: "never delivered".to_string(),
            },
        );

        router.unregister_conn(1);
        assert!(router.drain().is_empty());
    }
}
