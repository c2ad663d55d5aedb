//! courier-server: logic-node side of the message-routing core.
//!
//! Decodes packets arriving from gateway nodes, resolves the sender's
//! session, runs the handler chain registered for the packet's command, and
//! routes responses and forwarded messages back through the cluster fabric.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod fabric;
pub mod router;
pub mod serv;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::ServerConfig;
pub use context::{handler_fn, Context, Handler, HandlersChain};
pub use dispatcher::ServerDispatcher;
pub use fabric::LocalFabric;
pub use router::Router;
pub use serv::{resp_err, ServHandler};
pub use storage::MemorySessionStorage;
