//! Three-layer wire envelope around a sealed message.
//!
//! Encoding, innermost first:
//!
//! 1. the plaintext is padded, signed and sealed to the recipient
//! 2. the ciphertext becomes the `content` of an unidentified-sender envelope
//! 3. that envelope is the `body` of a `PUT /api/v1/message` transport request
//! 4. the request is the `source` of an outer envelope, whose bytes are what
//!    storage nodes keep
//!
//! Decoding reverses the layers. The sender is only ever taken from the
//! verified signature inside the sealed box.

use crate::crypto::{self, identity, Identity};
use crate::transport::proto::{envelope, Envelope, WebSocketRequestMessage};
use crate::utils::{ProtocolError, Result};
use prost::Message;

/// Verb of the transport request wrapping the inner envelope
pub const REQUEST_VERB: &str = "PUT";

/// Path of the transport request wrapping the inner envelope
pub const REQUEST_PATH: &str = "/api/v1/message";

/// Id of the transport request wrapping the inner envelope
pub const REQUEST_ID: u64 = 0;

/// Type tag carried by both envelope layers
pub const ENVELOPE_TYPE: envelope::Type = envelope::Type::UnidentifiedSender;

/// Result of opening a wire envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
    /// Unpadded plaintext
    pub plaintext: Vec<u8>,
    /// Session ID of the verified signer
    pub sender: String,
    /// Send time claimed by the inner envelope, in milliseconds
    pub timestamp: Option<u64>,
}

/// Build the wire payload carrying `plaintext` from `sender` to `recipient`
///
/// # Arguments
///
/// * `sender` - Identity that signs the message
/// * `recipient` - Session ID of the recipient
/// * `plaintext` - Arbitrary message bytes
/// * `timestamp_ms` - Send time written into both envelope layers
pub fn encode(
    sender: &Identity,
    recipient: &str,
    plaintext: &[u8],
    timestamp_ms: u64,
) -> Result<Vec<u8>> {
    let recipient_key = identity::parse_session_id(recipient)?;
    let ciphertext = crypto::sign_and_encrypt(sender, &recipient_key, &crypto::pad(plaintext))?;

    let inner = Envelope {
        r#type: Some(ENVELOPE_TYPE as i32),
        source: None,
        timestamp: Some(timestamp_ms),
        content: Some(ciphertext),
    };

    let request = WebSocketRequestMessage {
        verb: Some(REQUEST_VERB.to_string()),
        path: Some(REQUEST_PATH.to_string()),
        body: Some(inner.encode_to_vec()),
        id: Some(REQUEST_ID),
    };

    let outer = Envelope {
        r#type: Some(ENVELOPE_TYPE as i32),
        source: Some(request.encode_to_vec()),
        timestamp: Some(timestamp_ms),
        content: None,
    };

    Ok(outer.encode_to_vec())
}

/// Open a wire payload addressed to `recipient`
///
/// # Errors
///
/// Protocol errors for framing problems (undecodable layer, missing `source`,
/// `body` or `content`, missing padding delimiter), `CryptoError::Decryption`
/// if the box is not for us or is corrupted, and
/// `CryptoError::SignatureVerification` if the inner signature is invalid
pub fn decode(recipient: &Identity, wire: &[u8]) -> Result<DecodedEnvelope> {
    let outer = Envelope::decode(wire)?;
    let source = outer.source.ok_or_else(|| missing("source"))?;

    let request = WebSocketRequestMessage::decode(source.as_slice())?;
    let body = request.body.ok_or_else(|| missing("body"))?;

    let inner = Envelope::decode(body.as_slice())?;
    let content = inner.content.ok_or_else(|| missing("content"))?;

    let (padded, sender_key) = crypto::decrypt_and_verify(recipient, &content)?;
    let plaintext = crypto::unpad(&padded)?.to_vec();

    Ok(DecodedEnvelope {
        plaintext,
        sender: identity::session_id_for(&sender_key),
        timestamp: inner.timestamp,
    })
}

fn missing(field: &str) -> ProtocolError {
    ProtocolError::MissingField {
        field: field.to_string(),
    }
}
