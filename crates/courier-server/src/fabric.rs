//! In-process cluster fabric.
//!
//! Each node registers an `mpsc` receiver under its id; pushes addressed to
//! that id land on the receiver, and the node fans the packet out to the
//! channels listed in its destination-channels metadata. Used by tests and
//! by single-process deployments.

use async_trait::async_trait;
use courier_core::{CourierError, CourierResult, Fabric, LogicPkt};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn, Span};

/// Node table of an in-process fabric.
pub struct LocalFabric {
    nodes: RwLock<HashMap<String, mpsc::Sender<LogicPkt>>>,
    capacity: usize,
    span: Span,
}

impl LocalFabric {
    /// `capacity` bounds each node's inbound queue.
    pub fn new(capacity: usize, span: Span) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            span,
        }
    }

    /// Attach a node, replacing any earlier registration under the same id.
    pub async fn register(&self, node_id: impl Into<String>) -> mpsc::Receiver<LogicPkt> {
        let node_id = node_id.into();
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.nodes.write().await.insert(node_id.clone(), tx).is_some() {
            warn!(
                parent: &self.span,
                node = %node_id,
                "node re-registered, previous receiver dropped"
            );
        } else {
            info!(parent: &self.span, node = %node_id, "node registered");
        }
        rx
    }

    /// Detach a node. Returns whether it was registered.
    pub async fn unregister(&self, node_id: &str) -> bool {
        let removed = self.nodes.write().await.remove(node_id).is_some();
        if removed {
            debug!(parent: &self.span, node = %node_id, "node unregistered");
        }
        removed
    }

    /// Ids of all attached nodes.
    pub async fn nodes(&self) -> Vec<String> {
        self.nodes.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Fabric for LocalFabric {
    async fn push(&self, node_id: &str, packet: LogicPkt) -> CourierResult<()> {
        let tx = self
            .nodes
            .read()
            .await
            .get(node_id)
            .cloned()
            .ok_or_else(|| CourierError::NodeNotFound(node_id.to_string()))?;

        tx.send(packet)
            .await
            .map_err(|_| CourierError::Transport(format!("node {node_id} inbound queue closed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SpanRecorder;

    #[tokio::test]
    async fn push_reaches_registered_node_only() {
        let fabric = LocalFabric::new(4, Span::none());
        let mut g1 = fabric.register("G1").await;

        fabric.push("G1", LogicPkt::new("c", "A")).await.unwrap();
        assert_eq!(g1.recv().await.unwrap().channel_id(), "A");

        let err = fabric.push("G2", LogicPkt::new("c", "A")).await.unwrap_err();
        assert!(matches!(err, CourierError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn dropped_receiver_is_transport_error() {
        let fabric = LocalFabric::new(4, Span::none());
        drop(fabric.register("G1").await);

        let err = fabric.push("G1", LogicPkt::new("c", "A")).await.unwrap_err();
        assert!(matches!(err, CourierError::Transport(_)));
    }

    #[tokio::test]
    async fn node_table_changes_log_under_injected_span() {
        let recorder = SpanRecorder::default();
        let _guard = recorder.install();
        let fabric = LocalFabric::new(4, tracing::info_span!("node"));

        let _rx = fabric.register("G1").await;
        fabric.unregister("G1").await;
        assert!(recorder.logged_under("node", "node registered"));
        assert!(recorder.logged_under("node", "node unregistered"));
    }

    #[tokio::test]
    async fn unregister_detaches_node() {
        let fabric = LocalFabric::new(4, Span::none());
        let _rx = fabric.register("G1").await;
        assert_eq!(fabric.nodes().await, vec!["G1".to_string()]);

        assert!(fabric.unregister("G1").await);
        assert!(!fabric.unregister("G1").await);
        assert!(fabric.push("G1", LogicPkt::new("c", "A")).await.is_err());
    }
}
