//! Per-packet execution context.
//!
//! A [`Context`] is created for one inbound packet, walks the handler chain
//! registered for its command, and gives handlers two ways to produce output:
//! [`Context::resp`] answers the sender, [`Context::dispatch`] forwards a body
//! to other connections grouped by the gateway node that owns them.
//!
//! A context is owned by the task processing its packet and is never shared,
//! so it carries no lock.

use async_trait::async_trait;
use courier_core::{
    CourierResult, Dispatcher, ErrorResp, Flag, Header, Location, LogicPkt, Session,
    SessionStorage, Status,
};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, Span};

/// One step of a handler chain.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context);
}

/// Ordered handlers for one command; insertion order is execution order.
pub type HandlersChain = Arc<[Arc<dyn Handler>]>;

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context) {
        (self.0)(ctx).await
    }
}

/// Wrap a closure as a [`Handler`].
///
/// ```ignore
/// let auth = handler_fn(|ctx| Box::pin(async move {
///     if ctx.header().channel_id.is_empty() {
///         ctx.abort();
///     }
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Request-scoped state for one inbound packet.
pub struct Context {
    handlers: HandlersChain,
    index: usize,
    request: LogicPkt,
    session: Option<Session>,
    dispatcher: Arc<dyn Dispatcher>,
    storage: Arc<dyn SessionStorage>,
    span: Span,
}

impl Context {
    pub(crate) fn new(
        request: LogicPkt,
        handlers: HandlersChain,
        dispatcher: Arc<dyn Dispatcher>,
        storage: Arc<dyn SessionStorage>,
        session: Option<Session>,
        span: Span,
    ) -> Self {
        Self {
            handlers,
            index: 0,
            request,
            session,
            dispatcher,
            storage,
            span,
        }
    }

    /// Run the handler under the cursor.
    ///
    /// The cursor moves past the handler before it runs, so a handler that
    /// calls `next()` itself reaches the following one and no handler runs
    /// twice. Past the end of the chain this does nothing.
    pub async fn next(&mut self) {
        let Some(handler) = self.handlers.get(self.index).cloned() else {
            return;
        };
        self.index += 1;
        handler.handle(self).await;
    }

    /// Skip every handler that has not run yet.
    pub fn abort(&mut self) {
        self.index = self.handlers.len();
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.handlers.len()
    }

    /// Position of the cursor in the chain.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn header(&self) -> &Header {
        &self.request.header
    }

    pub fn request(&self) -> &LogicPkt {
        &self.request
    }

    /// Decode the request body.
    pub fn read_body<T: serde::de::DeserializeOwned>(&self) -> CourierResult<T> {
        self.request.read_body()
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Session of the sender.
    ///
    /// When none was seeded, one is synthesized from the packet's
    /// destination-server metadata and cached; a packet without that
    /// metadata yields [`CourierError::MissingMeta`](courier_core::CourierError::MissingMeta).
    pub fn session(&mut self) -> CourierResult<&Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => Session::auto_generated(self.request.channel_id(), self.request.dest_server()?),
        };
        Ok(self.session.insert(session))
    }

    /// Answer the sender with an [`ErrorResp`] carrying `err`'s message.
    pub async fn resp_with_error<E>(&mut self, status: Status, err: E) -> CourierResult<()>
    where
        E: std::fmt::Display + Send,
    {
        let body = ErrorResp {
            message: err.to_string(),
        };
        self.resp(status, &body).await
    }

    /// Send a response to the sender's own connection.
    ///
    /// The response header is a copy of the request header, so command,
    /// sequence and metadata are preserved.
    pub async fn resp<T>(&mut self, status: Status, body: &T) -> CourierResult<()>
    where
        T: Serialize + Sync,
    {
        let mut packet = LogicPkt::new_from(&self.request.header);
        packet.status = status;
        packet.flag = Flag::Response;
        packet.write_body(body)?;

        let (account, to) = {
            let session = self.session()?;
            (session.account.clone(), session.location())
        };
        debug!(
            parent: &self.span,
            account = %account,
            header = %self.request.header,
            status = ?status,
            "<-- resp"
        );

        let channels = [to.channel_id];
        if let Err(e) = self.dispatcher.push(&to.gate_id, &channels, packet).await {
            error!(parent: &self.span, gate = %to.gate_id, error = %e, "resp push failed");
            return Err(e);
        }
        Ok(())
    }

    /// Forward `body` to `recvs`, one push per destination gateway.
    ///
    /// The sender's own channel is never a target. Every gateway group is
    /// attempted; the first failure is returned once all were tried.
    pub async fn dispatch<T>(&mut self, body: &T, recvs: &[Location]) -> CourierResult<()>
    where
        T: Serialize + Sync,
    {
        if recvs.is_empty() {
            return Ok(());
        }
        let mut packet = LogicPkt::new_from(&self.request.header);
        packet.flag = Flag::Push;
        packet.write_body(body)?;

        let me = self.session()?.channel_id.clone();
        debug!(
            parent: &self.span,
            recvs = recvs.len(),
            header = %self.request.header,
            "<-- dispatch"
        );

        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for recv in recvs {
            if recv.channel_id == me {
                continue;
            }
            groups
                .entry(recv.gate_id.as_str())
                .or_default()
                .push(recv.channel_id.clone());
        }

        let mut first_err = None;
        for (gate_id, channel_ids) in groups {
            if let Err(e) = self.dispatcher.push(gate_id, &channel_ids, packet.clone()).await {
                error!(
                    parent: &self.span,
                    gate = %gate_id,
                    channels = channel_ids.len(),
                    error = %e,
                    "dispatch push failed"
                );
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
