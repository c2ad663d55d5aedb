//! Dispatcher that routes pushes through the cluster fabric.

use async_trait::async_trait;
use courier_core::wire::{CHANNEL_SEPARATOR, META_DEST_CHANNELS};
use courier_core::{CourierResult, Dispatcher, Fabric, LogicPkt};
use std::sync::Arc;
use tracing::{trace, Span};

/// Writes the destination channels into the packet and hands it to the
/// fabric node named by `gate_id`. Fabric errors come back unchanged.
pub struct ServerDispatcher {
    fabric: Arc<dyn Fabric>,
    span: Span,
}

impl ServerDispatcher {
    pub fn new(fabric: Arc<dyn Fabric>, span: Span) -> Self {
        Self { fabric, span }
    }
}

#[async_trait]
impl Dispatcher for ServerDispatcher {
    async fn push(
        &self,
        gate_id: &str,
        channel_ids: &[String],
        mut packet: LogicPkt,
    ) -> CourierResult<()> {
        packet.add_meta(META_DEST_CHANNELS, channel_ids.join(CHANNEL_SEPARATOR));
        trace!(parent: &self.span, gate = %gate_id, channels = channel_ids.len(), "push");
        self.fabric.push(gate_id, packet).await
    }
}
