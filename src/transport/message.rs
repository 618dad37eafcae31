//! Raw and decrypted message types.

use crate::transport::envelope::DecodedEnvelope;
use crate::transport::proto::{Content, DataMessage, LokiProfile};
use crate::utils::Result;
use prost::Message;
use serde::{Deserialize, Serialize};

/// Ciphertext blob as stored by a storage node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Wire payload (outer envelope bytes)
    pub data: Vec<u8>,
    /// Node-assigned unique hash
    pub hash: String,
    /// Node-assigned timestamp in milliseconds
    pub timestamp: u64,
}

/// Decrypted and verified chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainMessage {
    /// Session ID of the verified sender
    pub from: String,
    /// Message text, absent for content without a data message
    pub body: Option<String>,
    /// Send time in milliseconds as claimed by the sender
    pub timestamp: u64,
    /// Opaque tag a reply should carry back
    pub reply_tag: Option<Vec<u8>>,
    /// Display name the sender attached, if any
    pub display_name: Option<String>,
}

/// A chat message waiting to be encrypted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message text
    pub body: String,
    /// Tag echoed from the message being answered
    pub reply_tag: Option<Vec<u8>>,
    /// Display name to attach
    pub display_name: Option<String>,
}

impl RawMessage {
    /// Create a raw message
    pub fn new(data: Vec<u8>, hash: impl Into<String>, timestamp: u64) -> Self {
        Self {
            data,
            hash: hash.into(),
            timestamp,
        }
    }
}

impl PlainMessage {
    /// Interpret an opened envelope as serialized `Content`
    pub fn from_decoded(decoded: DecodedEnvelope) -> Result<Self> {
        let content = Content::decode(decoded.plaintext.as_slice())?;
        let data = content.data_message.unwrap_or_default();

        Ok(Self {
            from: decoded.sender,
            body: data.body,
            timestamp: data.timestamp.or(decoded.timestamp).unwrap_or_default(),
            reply_tag: data.profile_key,
            display_name: data.profile.and_then(|p| p.display_name),
        })
    }

    /// Build the message answering this one with `body`
    pub fn reply(&self, body: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            body: body.into(),
            reply_tag: self.reply_tag.clone(),
            display_name: None,
        }
    }
}

impl OutgoingMessage {
    /// A plain text message
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Serialize into the `Content` bytes carried by the envelope
    pub fn to_content_bytes(&self, timestamp_ms: u64) -> Vec<u8> {
        Content {
            data_message: Some(DataMessage {
                body: Some(self.body.clone()),
                profile_key: self.reply_tag.clone(),
                timestamp: Some(timestamp_ms),
                profile: self.display_name.as_ref().map(|name| LokiProfile {
                    display_name: Some(name.clone()),
                    profile_picture: None,
                }),
                sync_target: None,
            }),
        }
        .encode_to_vec()
    }
}
