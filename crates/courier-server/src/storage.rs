//! In-process session storage.
//!
//! Keeps sessions indexed by channel id plus an account → device → location
//! index used to address every connection of a user. Suitable for a single
//! logic node and for tests; a clustered deployment plugs a shared cache in
//! behind the same [`SessionStorage`] trait.

use async_trait::async_trait;
use courier_core::{CourierError, CourierResult, Location, Session, SessionStorage};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, Span};

#[derive(Default)]
struct Tables {
    /// Sessions by channel id.
    sessions: HashMap<String, Session>,
    /// Locations by account, then device.
    locations: HashMap<String, BTreeMap<String, Location>>,
}

/// Session storage held in memory.
pub struct MemorySessionStorage {
    tables: RwLock<Tables>,
    span: Span,
}

impl Default for MemorySessionStorage {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

impl MemorySessionStorage {
    /// Empty storage logging under `span`.
    pub fn new(span: Span) -> Self {
        Self {
            tables: RwLock::default(),
            span,
        }
    }

    /// Number of stored sessions.
    pub async fn count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn add(&self, session: Session) -> CourierResult<()> {
        let mut tables = self.tables.write().await;
        if !session.account.is_empty() {
            tables
                .locations
                .entry(session.account.clone())
                .or_default()
                .insert(session.device.clone(), session.location());
        }
        debug!(parent: &self.span, session = %session, "session stored");
        tables.sessions.insert(session.channel_id.clone(), session);
        Ok(())
    }

    async fn delete(&self, account: &str, channel_id: &str) -> CourierResult<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.remove(channel_id);

        if let Some(devices) = tables.locations.get_mut(account) {
            devices.retain(|_, loc| loc.channel_id != channel_id);
            if devices.is_empty() {
                tables.locations.remove(account);
            }
        }
        debug!(parent: &self.span, account, channel_id, "session deleted");
        Ok(())
    }

    async fn get(&self, channel_id: &str) -> CourierResult<Session> {
        self.tables
            .read()
            .await
            .sessions
            .get(channel_id)
            .cloned()
            .ok_or_else(|| CourierError::SessionNotFound(channel_id.to_string()))
    }

    async fn get_locations(&self, accounts: &[&str]) -> CourierResult<Vec<Location>> {
        let tables = self.tables.read().await;
        let locations: Vec<Location> = accounts
            .iter()
            .filter_map(|account| tables.locations.get(*account))
            .flat_map(|devices| devices.values().cloned())
            .collect();

        if locations.is_empty() {
            return Err(CourierError::SessionNotFound(accounts.join(",")));
        }
        Ok(locations)
    }

    async fn get_location(&self, account: &str, device: &str) -> CourierResult<Location> {
        self.tables
            .read()
            .await
            .locations
            .get(account)
            .and_then(|devices| devices.get(device))
            .cloned()
            .ok_or_else(|| CourierError::SessionNotFound(format!("{account}/{device}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SpanRecorder;

    fn session(account: &str, device: &str, gate: &str, channel: &str) -> Session {
        Session {
            channel_id: channel.into(),
            gate_id: gate.into(),
            account: account.into(),
            device: device.into(),
            ..Session::default()
        }
    }

    #[tokio::test]
    async fn miss_is_session_not_found() {
        let storage = MemorySessionStorage::default();
        let err = storage.get("nope").await.unwrap_err();
        assert!(err.is_session_not_found());
    }

    #[tokio::test]
    async fn add_then_get_and_locate() {
        let storage = MemorySessionStorage::default();
        storage.add(session("alice", "phone", "G1", "a1")).await.unwrap();
        storage.add(session("alice", "pc", "G2", "a2")).await.unwrap();

        assert_eq!(storage.get("a2").await.unwrap().gate_id, "G2");
        assert_eq!(
            storage.get_location("alice", "phone").await.unwrap(),
            Location::new("G1", "a1")
        );

        let locations = storage.get_locations(&["alice", "bob"]).await.unwrap();
        assert_eq!(locations.len(), 2);
        assert!(locations.contains(&Location::new("G2", "a2")));
        assert_eq!(storage.count().await, 2);
    }

    #[tokio::test]
    async fn same_device_login_replaces_location() {
        let storage = MemorySessionStorage::default();
        storage.add(session("bob", "phone", "G1", "b1")).await.unwrap();
        storage.add(session("bob", "phone", "G2", "b2")).await.unwrap();

        assert_eq!(
            storage.get_locations(&["bob"]).await.unwrap(),
            vec![Location::new("G2", "b2")]
        );
    }

    #[tokio::test]
    async fn delete_removes_both_indexes() {
        let storage = MemorySessionStorage::default();
        storage.add(session("carol", "pc", "G1", "c1")).await.unwrap();
        storage.delete("carol", "c1").await.unwrap();

        assert!(storage.get("c1").await.unwrap_err().is_session_not_found());
        assert!(storage.get_location("carol", "pc").await.is_err());
        assert!(storage
            .get_locations(&["carol"])
            .await
            .unwrap_err()
            .is_session_not_found());
    }

    #[tokio::test]
    async fn writes_log_under_injected_span() {
        let recorder = SpanRecorder::default();
        let _guard = recorder.install();
        let storage = MemorySessionStorage::new(tracing::info_span!("node"));

        storage.add(session("dave", "pc", "G1", "d1")).await.unwrap();
        storage.delete("dave", "d1").await.unwrap();
        assert!(recorder.logged_under("node", "session stored"));
        assert!(recorder.logged_under("node", "session deleted"));
    }
}
