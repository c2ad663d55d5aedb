//! Shared fakes for unit tests.

use crate::context::{handler_fn, Handler};
use crate::storage::MemorySessionStorage;
use async_trait::async_trait;
use courier_core::{
    Agent, CourierError, CourierResult, Dispatcher, Location, LogicPkt, Session, SessionStorage,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{self, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// Dispatcher that records successful pushes and fails for chosen gateways.
#[derive(Default)]
pub struct RecordingDispatcher {
    pushes: Mutex<Vec<(String, Vec<String>, LogicPkt)>>,
    failing: HashSet<String>,
    attempts: AtomicUsize,
}

impl RecordingDispatcher {
    pub fn failing(gates: &[&str]) -> Self {
        Self {
            failing: gates.iter().map(|g| g.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn pushes(&self) -> Vec<(String, Vec<String>, LogicPkt)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn push(
        &self,
        gate_id: &str,
        channel_ids: &[String],
        packet: LogicPkt,
    ) -> CourierResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(gate_id) {
            return Err(CourierError::NodeNotFound(gate_id.to_string()));
        }
        self.pushes
            .lock()
            .unwrap()
            .push((gate_id.to_string(), channel_ids.to_vec(), packet));
        Ok(())
    }
}

/// Storage wrapper counting `get` calls, optionally failing them outright.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemorySessionStorage,
    gets: AtomicUsize,
    broken: bool,
}

impl CountingStorage {
    /// Every `get` fails with a storage error.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStorage for CountingStorage {
    async fn add(&self, session: Session) -> CourierResult<()> {
        self.inner.add(session).await
    }

    async fn delete(&self, account: &str, channel_id: &str) -> CourierResult<()> {
        self.inner.delete(account, channel_id).await
    }

    async fn get(&self, channel_id: &str) -> CourierResult<Session> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(CourierError::Storage("cache unreachable".into()));
        }
        self.inner.get(channel_id).await
    }

    async fn get_locations(&self, accounts: &[&str]) -> CourierResult<Vec<Location>> {
        self.inner.get_locations(accounts).await
    }

    async fn get_location(&self, account: &str, device: &str) -> CourierResult<Location> {
        self.inner.get_location(account, device).await
    }
}

pub struct TestAgent(pub String);

impl Agent for TestAgent {
    fn id(&self) -> &str {
        &self.0
    }
}

/// Handler that appends `name` to `log`, then optionally calls `next()`.
pub fn recorder(
    name: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
    call_next: bool,
) -> Arc<dyn Handler> {
    let log = log.clone();
    handler_fn(move |ctx| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().unwrap().push(name);
            if call_next {
                ctx.next().await;
            }
        })
    })
}

/// Layer recording `(span name, message)` for every event logged inside a span.
#[derive(Clone, Default)]
pub struct SpanRecorder(Arc<Mutex<Vec<(String, String)>>>);

impl SpanRecorder {
    /// Install as the thread's default subscriber. Spans must be created
    /// after this call to be recorded.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }

    pub fn logged_under(&self, span: &str, message: &str) -> bool {
        self.events().iter().any(|(s, m)| s == span && m == message)
    }
}

impl<S> Layer<S> for SpanRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: layer::Context<'_, S>) {
        let Some(span) = ctx.event_span(event) else {
            return;
        };
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.0.lock().unwrap().push((span.name().to_string(), message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}
