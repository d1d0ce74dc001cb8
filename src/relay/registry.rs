use std::collections::HashMap;
use std::net::SocketAddr;

use crate::relay::protocol::UserName;
use crate::relay::types::ConnId;

/// Identity half of one connection. The socket itself lives with the event
/// loop under the same `ConnId`.
#[derive(Debug)]
pub struct ConnRecord {
    pub addr: SocketAddr,
    pub username: Option<UserName>,
}

/// Outcome of a username claim.
#[derive(Debug)]
pub enum ClaimOutcome {
    Accepted,
    /// The name is unavailable; carries everyone currently identified.
    Rejected { current_users: Vec<UserName> },
}

/// Tracks live connections and which usernames they hold.
///
/// Usernames are globally unique among registered connections at all times;
/// `claim_username` is the only operation that hands one out.
#[derive(Debug, Default)]
pub struct Registry {
    conns: HashMap<ConnId, ConnRecord>,
    name_to_conn: HashMap<UserName, ConnId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly accepted, still unidentified connection.
    pub fn register(&mut self, conn_id: ConnId, addr: SocketAddr) {
        self.conns.insert(
            conn_id,
            ConnRecord {
                addr,
                username: None,
            },
        );
    }

    /// Remove a connection; returns its username if it was identified.
    pub fn unregister(&mut self, conn_id: ConnId) -> Option<UserName> {
        let record = self.conns.remove(&conn_id)?;
        if let Some(username) = record.username {
            self.name_to_conn.remove(&username);
            return Some(username);
        }
        None
    }

    /// Try to claim `username` for `conn_id`.
    ///
    /// A rejected claim leaves the record untouched, so the client may retry
    /// with a different name. A connection that already holds a name keeps
    /// it; later claims are rejected.
    pub fn claim_username(&mut self, conn_id: ConnId, username: &str) -> ClaimOutcome {
        let taken = self.name_to_conn.contains_key(username);
        let already_identified = self
            .conns
            .get(&conn_id)
            .is_none_or(|rec| rec.username.is_some());

        if taken || already_identified {
            return ClaimOutcome::Rejected {
                current_users: self.usernames(),
            };
        }

        if let Some(record) = self.conns.get_mut(&conn_id) {
            record.username = Some(username.to_owned());
            self.name_to_conn.insert(username.to_owned(), conn_id);
        }
        ClaimOutcome::Accepted
    }

    /// Get the username held by a connection, if identified.
    pub fn username_for(&self, conn_id: ConnId) -> Option<&str> {
        self.conns.get(&conn_id)?.username.as_deref()
    }

    /// Get the connection currently holding a username.
    pub fn conn_id_for(&self, username: &str) -> Option<ConnId> {
        self.name_to_conn.get(username).copied()
    }

    pub fn addr_for(&self, conn_id: ConnId) -> Option<SocketAddr> {
        self.conns.get(&conn_id).map(|rec| rec.addr)
    }

    /// First connection whose record matches `predicate`.
    pub fn find<P>(&self, predicate: P) -> Option<ConnId>
    where
        P: Fn(&ConnRecord) -> bool,
    {
        self.conns
            .iter()
            .find(|(_, rec)| predicate(rec))
            .map(|(id, _)| *id)
    }

    /// All identified usernames, sorted for stable listings.
    pub fn usernames(&self) -> Vec<UserName> {
        let mut names: Vec<UserName> = self.name_to_conn.keys().cloned().collect();
        names.sort();
        names
    }

    /// Identified connections as (conn, username) pairs.
    pub fn identified(&self) -> impl Iterator<Item = (ConnId, &str)> {
        self.conns
            .iter()
            .filter_map(|(id, rec)| rec.username.as_deref().map(|name| (*id, name)))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn at_most_one_connection_holds_a_username() {
        let mut registry = Registry::new();
        registry.register(1, addr(4001));
        registry.register(2, addr(4002));

        match registry.claim_username(1, "alice") {
            ClaimOutcome::Accepted => {}
            other => panic!("expected Accepted, got {:?}", other),
        }

        match registry.claim_username(2, "alice") {
            ClaimOutcome::Rejected { current_users } => {
                assert_eq!(current_users, vec!["alice".to_string()]);
            }
            other => panic!("expected Rejected, got {:?}", other),
        }

        assert_eq!(registry.conn_id_for("alice"), Some(1));
        assert_eq!(registry.username_for(2), None);
    }

    #[test]
    fn rejected_claimant_may_retry_with_a_new_name() {
        let mut registry = Registry::new();
        registry.register(1, addr(4001));
        registry.register(2, addr(4002));

        registry.claim_username(1, "alice");
        match registry.claim_username(2, "alice") {
            ClaimOutcome::Rejected { .. } => {}
            other => panic!("expected Rejected, got {:?}", other),
        }

        match registry.claim_username(2, "bob") {
            ClaimOutcome::Accepted => {}
            other => panic!("expected Accepted on retry, got {:?}", other),
        }
        assert_eq!(registry.username_for(2), Some("bob"));
    }

    #[test]
    fn identity_is_fixed_after_acceptance() {
        let mut registry = Registry::new();
        registry.register(1, addr(4001));

        registry.claim_username(1, "alice");
        match registry.claim_username(1, "alice2") {
            ClaimOutcome::Rejected { .. } => {}
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert_eq!(registry.username_for(1), Some("alice"));
    }

    #[test]
    fn unregister_frees_the_username_for_reclaim() {
        let mut registry = Registry::new();
        registry.register(1, addr(4001));
        registry.claim_username(1, "alice");

        assert_eq!(registry.unregister(1), Some("alice".to_string()));

        registry.register(2, addr(4002));
        match registry.claim_username(2, "alice") {
            ClaimOutcome::Accepted => {}
            other => panic!("expected freed name to be claimable, got {:?}", other),
        }
    }

    #[test]
    fn identified_skips_unidentified_connections() {
        let mut registry = Registry::new();
        registry.register(1, addr(4001));
        registry.register(2, addr(4002));
        registry.claim_username(1, "alice");

        let identified: Vec<_> = registry.identified().collect();
        assert_eq!(identified, vec![(1, "alice")]);
        assert_eq!(registry.len(), 2);

        let found = registry.find(|rec| rec.username.is_none());
        assert_eq!(found, Some(2));
    }
}
