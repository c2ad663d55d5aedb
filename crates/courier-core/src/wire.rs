//! Well-known metadata keys, command names and service names.

/// Node id of the gateway that delivered the packet.
pub const META_DEST_SERVER: &str = "dest.server";
/// Comma-joined channel ids the fabric must fan a packet out to.
pub const META_DEST_CHANNELS: &str = "dest.channels";

/// Separator used inside [`META_DEST_CHANNELS`].
pub const CHANNEL_SEPARATOR: &str = ",";

/// Tag carried by sessions synthesized from packet metadata.
pub const TAG_AUTO_GENERATED: &str = "AutoGenerated";

pub mod command {
    pub const LOGIN_SIGN_IN: &str = "login.signin";
    pub const LOGIN_SIGN_OUT: &str = "login.signout";

    pub const CHAT_USER_TALK: &str = "chat.user.talk";
    pub const CHAT_GROUP_TALK: &str = "chat.group.talk";
    pub const CHAT_TALK_ACK: &str = "chat.talk.ack";
}

pub mod service {
    pub const LOGIN: &str = "login";
    pub const CHAT: &str = "chat";
    pub const TCP_GATEWAY: &str = "tgateway";
    pub const WS_GATEWAY: &str = "wgateway";
}
