//! Cross-node push capabilities.

use crate::error::CourierResult;
use crate::packet::LogicPkt;
use async_trait::async_trait;

/// Delivers a packet to a set of connections attached to one gateway node.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn push(&self, gate_id: &str, channel_ids: &[String], packet: LogicPkt)
        -> CourierResult<()>;
}

/// The cluster fabric: addresses nodes by id.
///
/// An implementation fans the packet out to every channel named in
/// [`META_DEST_CHANNELS`](crate::wire::META_DEST_CHANNELS) that is attached to
/// `node_id`. An unknown node is an error.
#[async_trait]
pub trait Fabric: Send + Sync {
    async fn push(&self, node_id: &str, packet: LogicPkt) -> CourierResult<()>;
}
