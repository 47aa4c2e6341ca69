//! Wire envelopes exchanged on the notification websocket.
//!
//! ```text
//! server → client   {"uid": "<session>"}                         handshake
//! client → server   {"uid": "<session>", "subscribe": "<path>"}
//! client → server   {"uid": "<session>", "unsubscribe": "<path>"}
//! server → client   {"meta": {"channelName", "address"?, ..}, <body>}
//! server → client   {"block": {..}, "meta": {"hash", ..}}         block frames
//! ```

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::error::EnvelopeError;
use super::path::{Channel, Path};

/// Client → server subscription control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<String>,
}

impl ControlFrame {
    pub fn subscribe(uid: &str, path: &Path) -> Self {
        Self {
            uid: uid.to_string(),
            subscribe: Some(path.canonical().to_string()),
            unsubscribe: None,
        }
    }

    pub fn unsubscribe(uid: &str, path: &Path) -> Self {
        Self {
            uid: uid.to_string(),
            subscribe: None,
            unsubscribe: Some(path.canonical().to_string()),
        }
    }

    /// Serialize to the text message sent on the wire.
    pub fn to_text(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server → client session announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub uid: String,
}

/// Routing fields of an inbound event frame, parsed once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingMetadata {
    pub channel_name: String,
    /// Account address or drive key for addressed channels.
    pub key: Option<String>,
}

impl RoutingMetadata {
    pub fn parse(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let dto: EnvelopeDto = serde_json::from_slice(frame)?;
        dto.into_metadata()
    }

    /// Path of this frame on `channel`; global channels drop the key.
    pub fn path_for(&self, channel: Channel) -> Path {
        if channel.is_addressed() {
            Path::for_channel(channel, self.key.as_deref())
        } else {
            Path::for_channel(channel, None)
        }
    }
}

/// What an inbound text frame carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Handshake(Handshake),
    Event(RoutingMetadata),
}

impl InboundFrame {
    pub fn classify(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let dto: EnvelopeDto = serde_json::from_slice(frame)?;
        if dto.meta.is_none() && dto.block.is_none() {
            if let Some(uid) = dto.uid {
                return Ok(InboundFrame::Handshake(Handshake { uid }));
            }
        }
        dto.into_metadata().map(InboundFrame::Event)
    }
}

#[derive(Deserialize)]
struct EnvelopeDto {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    meta: Option<MetaDto>,
    #[serde(default)]
    block: Option<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaDto {
    #[serde(default)]
    channel_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

impl EnvelopeDto {
    fn into_metadata(self) -> Result<RoutingMetadata, EnvelopeError> {
        let has_block = self.block.is_some();
        let (channel_name, key) = match self.meta {
            Some(meta) => (meta.channel_name, meta.address),
            None => (None, None),
        };

        match channel_name.filter(|c| !c.is_empty()) {
            Some(channel_name) => Ok(RoutingMetadata {
                channel_name,
                key: key.filter(|k| !k.is_empty()),
            }),
            None if has_block => Ok(RoutingMetadata {
                channel_name: Channel::Block.as_str().to_string(),
                key: None,
            }),
            None => Err(EnvelopeError::MissingChannel),
        }
    }
}
