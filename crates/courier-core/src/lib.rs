//! courier-core: shared model of the message-routing core.
//!
//! Provides the logic packet envelope, session and location types, CBOR
//! framing, the error type, and the capability traits (session storage,
//! dispatcher, cluster fabric, transport lifecycle) the server crate wires
//! together.

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod session;
pub mod storage;
pub mod transport;
pub mod wire;

// Re-export commonly used items at crate root.
pub use codec::{cbor_decode, cbor_encode, frame_encode, FrameDecoder};
pub use dispatch::{Dispatcher, Fabric};
pub use error::{CourierError, CourierResult};
pub use packet::{ErrorResp, Flag, Header, InnerHandshakeReq, LogicPkt, Status};
pub use session::{Location, Session};
pub use storage::SessionStorage;
pub use transport::{Acceptor, Agent, Conn, MessageListener, StateListener};
