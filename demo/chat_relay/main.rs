//! # Scenario: Two-gateway chat relay
//!
//! **Actors**: alice (one phone), bob (a phone and a laptop on different gateways)
//!
//! Demonstrates:
//! - Gateway handshake accepted by the logic node
//! - Sign-in with an auto-generated session, then storing the real one
//! - A user talk fanned out to every device of the receiver, one push per gateway
//! - Talk acknowledgement from the receiving device
//! - Group talk that skips the sender's own connection
//! - Sign-out, after which the connection is answered with `SessionNotFound`

use anyhow::Context as _;
use courier_core::wire::{command, service, META_DEST_SERVER};
use courier_core::{
    cbor_encode, Acceptor, Agent, Conn, CourierResult, InnerHandshakeReq, LogicPkt,
    MessageListener, Session, StateListener, Status,
};
use courier_server::{
    handler_fn, Context, Handler, LocalFabric, MemorySessionStorage, Router, ServHandler,
    ServerConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct LoginReq {
    account: String,
    device: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TalkReq {
    dest: Vec<String>,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TalkPush {
    sender: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TalkAck {
    seq: u32,
}

struct Gateway(String);

impl Agent for Gateway {
    fn id(&self) -> &str {
        &self.0
    }
}

/// Connection whose single frame is the gateway's handshake.
struct HandshakeConn(Option<Vec<u8>>);

#[async_trait::async_trait]
impl Conn for HandshakeConn {
    async fn read_frame(&mut self) -> CourierResult<Vec<u8>> {
        self.0
            .take()
            .ok_or_else(|| courier_core::CourierError::Transport("connection closed".into()))
    }
}

fn sep(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {title}");
    println!("{}\n", "=".repeat(60));
}

fn log_request() -> Arc<dyn Handler> {
    handler_fn(|ctx| {
        Box::pin(async move {
            let bytes = ctx.request().body.len();
            info!(parent: ctx.span(), header = %ctx.header(), bytes, "--> request");
        })
    })
}

fn sign_in() -> Arc<dyn Handler> {
    handler_fn(|ctx| Box::pin(sign_in_inner(ctx)))
}

async fn sign_in_inner(ctx: &mut Context) {
    let req: LoginReq = match ctx.read_body() {
        Ok(req) => req,
        Err(e) => {
            let _ = ctx.resp_with_error(Status::InvalidPacketBody, e).await;
            return;
        }
    };
    let session = match ctx.session() {
        Ok(auto) => Session {
            channel_id: auto.channel_id.clone(),
            gate_id: auto.gate_id.clone(),
            account: req.account,
            device: req.device,
            ..Session::default()
        },
        Err(e) => {
            let _ = ctx.resp_with_error(Status::SystemException, e).await;
            return;
        }
    };
    let storage = ctx.storage().clone();
    if let Err(e) = storage.add(session).await {
        let _ = ctx.resp_with_error(Status::SystemException, e).await;
        return;
    }
    let _ = ctx.resp(Status::Success, &"welcome".to_string()).await;
}

fn sign_out() -> Arc<dyn Handler> {
    handler_fn(|ctx| Box::pin(sign_out_inner(ctx)))
}

async fn sign_out_inner(ctx: &mut Context) {
    let (account, channel_id) = match ctx.session() {
        Ok(session) => (session.account.clone(), session.channel_id.clone()),
        Err(e) => {
            let _ = ctx.resp_with_error(Status::SystemException, e).await;
            return;
        }
    };
    let storage = ctx.storage().clone();
    if let Err(e) = storage.delete(&account, &channel_id).await {
        let _ = ctx.resp_with_error(Status::SystemException, e).await;
        return;
    }
    let _ = ctx.resp(Status::Success, &()).await;
}

fn talk_ack() -> Arc<dyn Handler> {
    handler_fn(|ctx| {
        Box::pin(async move {
            match ctx.read_body::<TalkAck>() {
                Ok(ack) => {
                    info!(parent: ctx.span(), acked = ack.seq, "talk acknowledged");
                    let _ = ctx.resp(Status::Success, &ack).await;
                }
                Err(e) => {
                    let _ = ctx.resp_with_error(Status::InvalidPacketBody, e).await;
                }
            }
        })
    })
}

fn talk() -> Arc<dyn Handler> {
    handler_fn(|ctx| Box::pin(talk_inner(ctx)))
}

async fn talk_inner(ctx: &mut Context) {
    let req: TalkReq = match ctx.read_body() {
        Ok(req) => req,
        Err(e) => {
            let _ = ctx.resp_with_error(Status::InvalidPacketBody, e).await;
            return;
        }
    };
    let accounts: Vec<&str> = req.dest.iter().map(String::as_str).collect();
    let storage = ctx.storage().clone();
    let locations = match storage.get_locations(&accounts).await {
        Ok(locations) => locations,
        Err(e) => {
            let _ = ctx.resp_with_error(Status::NoDestination, e).await;
            return;
        }
    };
    let sender = match ctx.session() {
        Ok(session) => session.account.clone(),
        Err(_) => String::new(),
    };
    let push = TalkPush {
        sender,
        text: req.text,
    };
    match ctx.dispatch(&push, &locations).await {
        Ok(()) => {
            let _ = ctx.resp(Status::Success, &locations.len()).await;
        }
        Err(e) => {
            let _ = ctx.resp_with_error(Status::SystemException, e).await;
        }
    }
}

fn request<T: Serialize>(
    cmd: &str,
    channel: &str,
    gateway: &str,
    seq: u32,
    body: &T,
) -> anyhow::Result<Vec<u8>> {
    let mut packet = LogicPkt::new(cmd, channel);
    packet.header.sequence = seq;
    packet.add_meta(META_DEST_SERVER, gateway);
    packet.write_body(body)?;
    Ok(packet.encode()?)
}

/// Print everything the fabric delivers to one gateway node.
fn spawn_gateway(
    name: String,
    mut rx: mpsc::Receiver<LogicPkt>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            let body = if packet.body.is_empty() {
                "-".to_string()
            } else {
                match packet.read_body::<serde_json::Value>() {
                    Ok(v) => serde_json::to_string(&v).unwrap_or_default(),
                    Err(_) => format!("{} bytes", packet.body.len()),
                }
            };
            for channel in packet.dest_channels() {
                println!(
                    "[{name}] -> {channel:<6} {:?}/{:?} {} seq={} body={body}",
                    packet.flag, packet.status, packet.header.command, packet.header.sequence
                );
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref()).context("loading config")?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let span = config.span();
    info!(parent: &span, "starting chat relay demo");

    // ── Wiring ──────────────────────────────────────────────────
    let tcp = Gateway(format!("{}-1", service::TCP_GATEWAY));
    let ws = Gateway(format!("{}-1", service::WS_GATEWAY));

    let fabric = Arc::new(LocalFabric::new(config.fabric_capacity, span.clone()));
    let tcp_task = spawn_gateway(tcp.0.clone(), fabric.register(tcp.id()).await);
    let ws_task = spawn_gateway(ws.0.clone(), fabric.register(ws.id()).await);

    let storage = Arc::new(MemorySessionStorage::new(span.clone()));

    let mut router = Router::new(span.clone());
    router.use_middleware([log_request()]);
    router.handle(command::LOGIN_SIGN_IN, [sign_in()]);
    router.handle(command::LOGIN_SIGN_OUT, [sign_out()]);
    router.handle(command::CHAT_USER_TALK, [talk()]);
    router.handle(command::CHAT_GROUP_TALK, [talk()]);
    router.handle(command::CHAT_TALK_ACK, [talk_ack()]);

    let serv = ServHandler::new(
        Arc::new(router),
        storage.clone(),
        fabric.clone(),
        span.clone(),
    );

    // ── Handshake ───────────────────────────────────────────────
    sep("Gateways connect");
    for gateway in [&tcp, &ws] {
        let handshake = cbor_encode(&InnerHandshakeReq {
            service_id: gateway.id().to_string(),
        })?;
        let mut conn = HandshakeConn(Some(handshake));
        let id = serv.accept(&mut conn, config.accept_timeout).await?;
        println!("accepted {id}");
    }

    // ── Sign in ─────────────────────────────────────────────────
    sep("Sign in");
    let logins = [
        (&tcp, "a-phone", "alice", "phone"),
        (&ws, "b-phone", "bob", "phone"),
        (&tcp, "b-pc", "bob", "pc"),
    ];
    for (seq, (gateway, channel, account, device)) in logins.into_iter().enumerate() {
        let login = LoginReq {
            account: account.into(),
            device: device.into(),
        };
        let seq = seq as u32 + 1;
        let payload = request(command::LOGIN_SIGN_IN, channel, gateway.id(), seq, &login)?;
        serv.receive(gateway, payload).await;
    }
    println!("stored sessions: {}", storage.count().await);

    // ── Talk ────────────────────────────────────────────────────
    sep("alice talks to bob (two devices, two gateways)");
    let hello = TalkReq {
        dest: vec!["bob".into()],
        text: "hi bob".into(),
    };
    let payload = request(command::CHAT_USER_TALK, "a-phone", tcp.id(), 10, &hello)?;
    serv.receive(&tcp, payload).await;

    sep("bob's phone acknowledges");
    let payload = request(command::CHAT_TALK_ACK, "b-phone", ws.id(), 11, &TalkAck { seq: 10 })?;
    serv.receive(&ws, payload).await;

    sep("group talk from bob's laptop (own connection skipped)");
    let group = TalkReq {
        dest: vec!["alice".into(), "bob".into()],
        text: "meeting at 10".into(),
    };
    let payload = request(command::CHAT_GROUP_TALK, "b-pc", tcp.id(), 12, &group)?;
    serv.receive(&tcp, payload).await;

    // ── Sign out ────────────────────────────────────────────────
    sep("alice signs out, then talks again");
    let payload = request(command::LOGIN_SIGN_OUT, "a-phone", tcp.id(), 13, &())?;
    serv.receive(&tcp, payload).await;
    println!("stored sessions: {}", storage.count().await);

    let payload = request(command::CHAT_USER_TALK, "a-phone", tcp.id(), 14, &hello)?;
    serv.receive(&tcp, payload).await;

    // ── Shutdown ────────────────────────────────────────────────
    sep("Gateways disconnect");
    for gateway in [&tcp, &ws] {
        serv.disconnect(gateway.id()).await?;
        fabric.unregister(gateway.id()).await;
    }
    tcp_task.await?;
    ws_task.await?;

    info!(parent: &span, "chat relay demo finished");
    Ok(())
}
