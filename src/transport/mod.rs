//! Wire format for messages stored on the network.
//!
//! This module provides the protobuf records, the layered envelope codec that
//! turns plaintext into the payload a storage node keeps, and the raw and
//! decrypted message types built on top of them.

pub mod envelope;
pub mod message;
#[allow(missing_docs)]
pub mod proto;

pub use envelope::{decode, encode, DecodedEnvelope};
pub use message::*;
