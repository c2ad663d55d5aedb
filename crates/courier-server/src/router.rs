//! Command router: maps a packet's command to its handler chain and drives it.

use crate::context::{Context, Handler, HandlersChain};
use courier_core::{CourierError, CourierResult, Dispatcher, LogicPkt, Session, SessionStorage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, Span};

/// Registry of handler chains keyed by command.
///
/// Built mutably at startup, then shared behind an `Arc` and only read.
pub struct Router {
    middlewares: Vec<Arc<dyn Handler>>,
    handlers: HashMap<String, HandlersChain>,
    span: Span,
}

impl Router {
    /// Create an empty router logging under `span`.
    pub fn new(span: Span) -> Self {
        Self {
            middlewares: Vec::new(),
            handlers: HashMap::new(),
            span,
        }
    }

    /// Add global middleware.
    ///
    /// Middleware is prepended to every chain registered *after* this call.
    pub fn use_middleware(&mut self, handlers: impl IntoIterator<Item = Arc<dyn Handler>>) {
        self.middlewares.extend(handlers);
    }

    /// Register the chain for `command`, replacing any previous one.
    pub fn handle(
        &mut self,
        command: impl Into<String>,
        handlers: impl IntoIterator<Item = Arc<dyn Handler>>,
    ) {
        let command = command.into();
        let chain: Vec<Arc<dyn Handler>> = self
            .middlewares
            .iter()
            .cloned()
            .chain(handlers)
            .collect();
        info!(parent: &self.span, command = %command, handlers = chain.len(), "registered command");
        self.handlers.insert(command, chain.into());
    }

    /// Whether a chain is registered for `command`.
    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Run the chain registered for the packet's command to completion.
    ///
    /// Handlers may drive the chain themselves through [`Context::next`];
    /// whatever they leave unvisited is run here in order, unless a handler
    /// called [`Context::abort`].
    pub async fn serve(
        &self,
        packet: LogicPkt,
        dispatcher: Arc<dyn Dispatcher>,
        storage: Arc<dyn SessionStorage>,
        session: Session,
    ) -> CourierResult<()> {
        let chain = self
            .handlers
            .get(packet.command())
            .cloned()
            .ok_or_else(|| CourierError::UnregisteredCommand(packet.command().to_string()))?;

        let span = tracing::debug_span!(
            parent: &self.span,
            "ctx",
            command = %packet.command(),
            channel = %packet.channel_id(),
            seq = packet.header.sequence,
        );
        let mut ctx = Context::new(packet, chain, dispatcher, storage, Some(session), span);
        while !ctx.is_finished() {
            ctx.next().await;
        }
        debug!(parent: ctx.span(), "chain finished");
        Ok(())
    }
}
