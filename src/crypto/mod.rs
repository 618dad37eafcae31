//! Cryptographic primitives and identity management.
//!
//! This module provides the identity keypair and its derived encryption keys,
//! the block padding scheme, and the sign-then-seal construction that every
//! message on the network is wrapped in.

pub mod identity;
pub mod padding;
pub mod sealed;

pub use identity::*;
pub use padding::{pad, unpad, PADDING_BLOCK_SIZE};
pub use sealed::{decrypt_and_verify, sign_and_encrypt};
