//! Connection adapter between the transport layer and the router.
//!
//! Per connection: `accept` once, `receive` for every frame, `disconnect`
//! when the transport drops it.

use crate::dispatcher::ServerDispatcher;
use crate::router::Router;
use async_trait::async_trait;
use courier_core::wire::{command, META_DEST_CHANNELS};
use courier_core::{
    cbor_decode, Acceptor, Agent, Conn, CourierError, CourierResult, Dispatcher, Fabric, Flag,
    InnerHandshakeReq, LogicPkt, MessageListener, Session, SessionStorage, StateListener, Status,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Span};

/// Lifecycle handler for connections from gateway nodes.
pub struct ServHandler {
    router: Arc<Router>,
    cache: Arc<dyn SessionStorage>,
    dispatcher: Arc<dyn Dispatcher>,
    fabric: Arc<dyn Fabric>,
    span: Span,
}

impl ServHandler {
    pub fn new(
        router: Arc<Router>,
        cache: Arc<dyn SessionStorage>,
        fabric: Arc<dyn Fabric>,
        span: Span,
    ) -> Self {
        Self {
            router,
            cache,
            dispatcher: Arc::new(ServerDispatcher::new(fabric.clone(), span.clone())),
            fabric,
            span,
        }
    }

    /// Resolve the sender's session, answering the sender when that fails.
    async fn resolve_session(&self, agent: &dyn Agent, packet: &LogicPkt) -> Option<Session> {
        if packet.command() == command::LOGIN_SIGN_IN {
            // not stored until sign-in completes
            return match packet.dest_server() {
                Ok(server) => Some(Session::auto_generated(packet.channel_id(), server)),
                Err(e) => {
                    warn!(
                        parent: &self.span,
                        header = %packet.header,
                        error = %e,
                        "sign-in without destination server"
                    );
                    self.reply_error(agent, packet, Status::SystemException).await;
                    None
                }
            };
        }

        match self.cache.get(packet.channel_id()).await {
            Ok(session) => Some(session),
            Err(e) if e.is_session_not_found() => {
                debug!(parent: &self.span, channel = %packet.channel_id(), "session not found");
                self.reply_error(agent, packet, Status::SessionNotFound).await;
                None
            }
            Err(e) => {
                warn!(
                    parent: &self.span,
                    channel = %packet.channel_id(),
                    error = %e,
                    "session lookup failed"
                );
                self.reply_error(agent, packet, Status::SystemException).await;
                None
            }
        }
    }

    async fn reply_error(&self, agent: &dyn Agent, packet: &LogicPkt, status: Status) {
        if let Err(e) = resp_err(self.fabric.as_ref(), agent.id(), packet, status).await {
            error!(
                parent: &self.span,
                node = %agent.id(),
                error = %e,
                "error response push failed"
            );
        }
    }
}

/// Answer `request` with an empty response carrying `status`.
///
/// The response goes back through the node the request came from (`node_id`),
/// addressed to the request's channel.
pub async fn resp_err(
    fabric: &dyn Fabric,
    node_id: &str,
    request: &LogicPkt,
    status: Status,
) -> CourierResult<()> {
    let mut packet = LogicPkt::new_from(&request.header);
    packet.status = status;
    packet.flag = Flag::Response;
    packet.add_meta(META_DEST_CHANNELS, request.channel_id());
    fabric.push(node_id, packet).await
}

#[async_trait]
impl Acceptor for ServHandler {
    async fn accept(&self, conn: &mut dyn Conn, timeout: Duration) -> CourierResult<String> {
        let frame = tokio::time::timeout(timeout, conn.read_frame())
            .await
            .map_err(|_| CourierError::Timeout)??;

        let req: InnerHandshakeReq = cbor_decode(&frame)?;
        if req.service_id.is_empty() {
            return Err(CourierError::InvalidMessage(
                "handshake without service id".into(),
            ));
        }
        info!(parent: &self.span, service_id = %req.service_id, "accept");
        Ok(req.service_id)
    }
}

#[async_trait]
impl MessageListener for ServHandler {
    async fn receive(&self, agent: &dyn Agent, payload: Vec<u8>) {
        let packet = match LogicPkt::decode(&payload) {
            Ok(packet) => packet,
            Err(e) => {
                error!(
                    parent: &self.span,
                    node = %agent.id(),
                    error = %e,
                    "undecodable packet dropped"
                );
                return;
            }
        };

        let Some(session) = self.resolve_session(agent, &packet).await else {
            return;
        };
        debug!(parent: &self.span, session = %session, header = %packet.header, "recv a message");

        if let Err(e) = self
            .router
            .serve(packet, self.dispatcher.clone(), self.cache.clone(), session)
            .await
        {
            warn!(parent: &self.span, error = %e, "serve failed");
        }
    }
}

#[async_trait]
impl StateListener for ServHandler {
    async fn disconnect(&self, id: &str) -> CourierResult<()> {
        warn!(parent: &self.span, id, "close event");
        Ok(())
    }
}
