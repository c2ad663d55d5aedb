//! Who owns a connection and where it lives.

use crate::wire::TAG_AUTO_GENERATED;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Read-only view of a logged-in connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub channel_id: String,
    /// Gateway node terminating the connection.
    pub gate_id: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub remote_ip: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Session {
    /// Session synthesized from packet metadata when nothing is stored yet.
    pub fn auto_generated(channel_id: impl Into<String>, gate_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            gate_id: gate_id.into(),
            tags: BTreeSet::from([TAG_AUTO_GENERATED.to_string()]),
            ..Self::default()
        }
    }

    pub fn is_auto_generated(&self) -> bool {
        self.tags.contains(TAG_AUTO_GENERATED)
    }

    /// Dispatch address of this connection.
    pub fn location(&self) -> Location {
        Location {
            gate_id: self.gate_id.clone(),
            channel_id: self.channel_id.clone(),
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "account:{} channel:{} gate:{}",
            self.account, self.channel_id, self.gate_id
        )
    }
}

/// `(gate_id, channel_id)` pair used as a dispatch target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub gate_id: String,
    pub channel_id: String,
}

impl Location {
    pub fn new(gate_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            gate_id: gate_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_generated_session_is_tagged() {
        let s = Session::auto_generated("ch-9", "gw-2");
        assert_eq!(s.channel_id, "ch-9");
        assert_eq!(s.gate_id, "gw-2");
        assert!(s.account.is_empty());
        assert!(s.is_auto_generated());
        assert_eq!(s.location(), Location::new("gw-2", "ch-9"));
    }
}
