//! Boundary with the connection layer.
//!
//! The transport accepts sockets and frames bytes; the routing core only sees
//! these traits. Frames of one connection are delivered in order and never
//! overlap, frames of different connections may be handled concurrently.

use crate::error::CourierResult;
use async_trait::async_trait;
use std::time::Duration;

/// A framed connection that has not been accepted yet.
#[async_trait]
pub trait Conn: Send {
    /// Read the next frame payload.
    async fn read_frame(&mut self) -> CourierResult<Vec<u8>>;
}

/// An accepted connection as seen by message listeners.
pub trait Agent: Send + Sync {
    /// Logical id returned by [`Acceptor::accept`].
    fn id(&self) -> &str;
}

/// Decides whether a new connection is accepted and under which id.
#[async_trait]
pub trait Acceptor: Send + Sync {
    async fn accept(&self, conn: &mut dyn Conn, timeout: Duration) -> CourierResult<String>;
}

/// Receives every frame of an accepted connection.
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn receive(&self, agent: &dyn Agent, payload: Vec<u8>);
}

/// Connection state notifications.
#[async_trait]
pub trait StateListener: Send + Sync {
    async fn disconnect(&self, id: &str) -> CourierResult<()>;
}
