//! Session lookup capability.
//!
//! The backing store (typically a shared cache) lives outside the routing
//! core; everything here consumes this trait.

use crate::error::CourierResult;
use crate::session::{Location, Session};
use async_trait::async_trait;

/// Resolves connection ids to sessions.
///
/// Implementations must report a miss as
/// [`CourierError::SessionNotFound`](crate::CourierError::SessionNotFound) and
/// every other failure as a different variant, so callers can tell a client
/// that never logged in apart from a broken store.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Store a session, indexed by channel id and by account/device.
    async fn add(&self, session: Session) -> CourierResult<()>;

    /// Remove the session of `channel_id` owned by `account`.
    async fn delete(&self, account: &str, channel_id: &str) -> CourierResult<()>;

    /// Look up the session bound to a connection.
    async fn get(&self, channel_id: &str) -> CourierResult<Session>;

    /// Every known location of the given accounts. Accounts without a
    /// session are skipped.
    async fn get_locations(&self, accounts: &[&str]) -> CourierResult<Vec<Location>>;

    /// Location of one account on one device.
    async fn get_location(&self, account: &str, device: &str) -> CourierResult<Location>;
}
