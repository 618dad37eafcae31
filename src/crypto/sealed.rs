//! Sign-then-seal: sender authentication inside anonymous encryption.
//!
//! The sender signs `body || sender_ed25519 || recipient_x25519` and appends
//! its public key and signature to the body. The result is sealed to the
//! recipient's X25519 key with an ephemeral keypair, so the ciphertext alone
//! says nothing about who sent it. Only the recipient, after opening the box,
//! learns and verifies the sender.

use crate::crypto::identity::{ed25519_to_x25519_public, verify_signature, Identity};
use crate::utils::{CryptoError, ProtocolError, Result};
use crypto_box::{PublicKey, SecretKey};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use rand::rngs::OsRng;

/// Bytes appended to the body before sealing
pub const SIGNED_TRAILER_LENGTH: usize = PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH;

/// Sign `body` as `sender` and seal it to the recipient's Ed25519 key
///
/// # Errors
///
/// Returns `CryptoError::KeyConversion` if the recipient key is not a valid
/// Edwards point and `CryptoError::Encryption` if sealing fails
pub fn sign_and_encrypt(
    sender: &Identity,
    recipient_public_key: &[u8; PUBLIC_KEY_LENGTH],
    body: &[u8],
) -> Result<Vec<u8>> {
    let recipient_curve = ed25519_to_x25519_public(recipient_public_key)?;
    let sender_public = sender.public_key_bytes();

    let mut verification = Vec::with_capacity(body.len() + 2 * PUBLIC_KEY_LENGTH);
    verification.extend_from_slice(body);
    verification.extend_from_slice(&sender_public);
    verification.extend_from_slice(&recipient_curve);
    let signature = sender.sign(&verification);

    let mut signed = Vec::with_capacity(body.len() + SIGNED_TRAILER_LENGTH);
    signed.extend_from_slice(body);
    signed.extend_from_slice(&sender_public);
    signed.extend_from_slice(&signature);

    PublicKey::from(recipient_curve)
        .seal(&mut OsRng, &signed)
        .map_err(|e| {
            CryptoError::Encryption {
                reason: e.to_string(),
            }
            .into()
        })
}

/// Open a sealed box addressed to `recipient` and verify the signature inside
///
/// Returns the signed body and the sender's Ed25519 public key. The sender is
/// taken only from the verified trailer.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the box does not open,
/// `ProtocolError::InvalidMessage` if the opened buffer is too short to hold a
/// signature trailer, and `CryptoError::SignatureVerification` if the
/// signature does not match
pub fn decrypt_and_verify(
    recipient: &Identity,
    ciphertext: &[u8],
) -> Result<(Vec<u8>, [u8; PUBLIC_KEY_LENGTH])> {
    let curve = recipient.curve_keys()?;
    let mut signed = SecretKey::from(curve.secret_bytes())
        .unseal(ciphertext)
        .map_err(|_| CryptoError::Decryption {
            reason: "sealed box did not open".to_string(),
        })?;

    if signed.len() < SIGNED_TRAILER_LENGTH {
        return Err(ProtocolError::InvalidMessage {
            reason: format!("opened box holds only {} bytes", signed.len()),
        }
        .into());
    }

    let body_len = signed.len() - SIGNED_TRAILER_LENGTH;
    let signature = signed.split_off(body_len + PUBLIC_KEY_LENGTH);
    let mut sender_public = [0u8; PUBLIC_KEY_LENGTH];
    sender_public.copy_from_slice(&signed[body_len..]);
    signed.truncate(body_len);

    let mut verification = signed.clone();
    verification.extend_from_slice(&sender_public);
    verification.extend_from_slice(&curve.public_bytes());
    verify_signature(&sender_public, &verification, &signature)?;

    Ok((signed, sender_public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::CourierError;

    #[test]
    fn test_sign_encrypt_roundtrip() {
        let sender = Identity::generate();
        let recipient = Identity::generate();

        let ct = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"bepis").unwrap();
        let (body, from) = decrypt_and_verify(&recipient, &ct).unwrap();

        assert_eq!(body, b"bepis");
        assert_eq!(from, sender.public_key_bytes());
    }

    #[test]
    fn test_ciphertext_is_randomized() {
        let sender = Identity::generate();
        let recipient = Identity::generate();

        let a = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"same").unwrap();
        let b = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ciphertext_does_not_contain_sender_key() {
        let sender = Identity::generate();
        let recipient = Identity::generate();
        let ct = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"hi").unwrap();

        let key = sender.public_key_bytes();
        assert!(!ct.windows(key.len()).any(|w| w == key));
    }

    #[test]
    fn test_wrong_recipient_fails_to_decrypt() {
        let sender = Identity::generate();
        let recipient = Identity::generate();
        let eavesdropper = Identity::generate();

        let ct = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"secret").unwrap();
        assert!(matches!(
            decrypt_and_verify(&eavesdropper, &ct),
            Err(CourierError::Crypto(CryptoError::Decryption { .. }))
        ));
    }

    #[test]
    fn test_any_bit_flip_is_detected() {
        let sender = Identity::generate();
        let recipient = Identity::generate();
        let ct = sign_and_encrypt(&sender, &recipient.public_key_bytes(), b"tamper me").unwrap();

        for byte in 0..ct.len() {
            for bit in [0u8, 3, 7] {
                let mut tampered = ct.clone();
                tampered[byte] ^= 1 << bit;
                let err = decrypt_and_verify(&recipient, &tampered).unwrap_err();
                assert!(
                    matches!(
                        err,
                        CourierError::Crypto(
                            CryptoError::Decryption { .. } | CryptoError::SignatureVerification
                        )
                    ),
                    "byte {} bit {}: {:?}",
                    byte,
                    bit,
                    err
                );
            }
        }
    }

    #[test]
    fn test_forged_signature_is_rejected() {
        let claimed = Identity::generate();
        let forger = Identity::generate();
        let recipient = Identity::generate();
        let curve = recipient.curve_keys().unwrap();

        // body || claimed sender key || signature by someone else
        let mut verification = b"forged".to_vec();
        verification.extend_from_slice(&claimed.public_key_bytes());
        verification.extend_from_slice(&curve.public_bytes());
        let mut signed = b"forged".to_vec();
        signed.extend_from_slice(&claimed.public_key_bytes());
        signed.extend_from_slice(&forger.sign(&verification));

        let ct = PublicKey::from(curve.public_bytes())
            .seal(&mut OsRng, &signed)
            .unwrap();
        assert!(matches!(
            decrypt_and_verify(&recipient, &ct),
            Err(CourierError::Crypto(CryptoError::SignatureVerification))
        ));
    }

    #[test]
    fn test_short_payload_is_rejected() {
        let recipient = Identity::generate();
        let curve = recipient.curve_keys().unwrap();
        let ct = PublicKey::from(curve.public_bytes())
            .seal(&mut OsRng, &[1u8; 10])
            .unwrap();

        assert!(matches!(
            decrypt_and_verify(&recipient, &ct),
            Err(CourierError::Protocol(ProtocolError::InvalidMessage { .. }))
        ));
    }
}
