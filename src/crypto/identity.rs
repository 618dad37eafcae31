//! Identity management and Ed25519/X25519 key handling.
//!
//! An identity is a single Ed25519 signing keypair. Its network address, the
//! session ID, is the public key in hex behind a version tag. The X25519
//! keypair used for sealed-box encryption is never stored; it is derived from
//! the Edwards keys each time it is needed.

use crate::utils::{CryptoError, ProtocolError, Result};
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use std::fmt;
use std::path::Path;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Network version tag prepended to every session ID
pub const SESSION_ID_PREFIX: &str = "05";

/// Size of a persisted secret seed
pub const SEED_LENGTH: usize = SECRET_KEY_LENGTH;

/// Ed25519 keypair identifying one participant
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

/// Montgomery-form keypair derived from an [`Identity`]
#[derive(Clone)]
pub struct CurveKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl Identity {
    /// Generate a new random identity
    ///
    /// # Example
    ///
    /// ```rust
    /// use swarm_courier::crypto::Identity;
    ///
    /// let identity = Identity::generate();
    /// assert!(identity.session_id().starts_with("05"));
    /// ```
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Rebuild an identity from its 32-byte secret seed
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::BadSeedSize` unless `seed` is exactly 32 bytes
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; SEED_LENGTH] = seed.try_into().map_err(|_| CryptoError::BadSeedSize {
            expected: SEED_LENGTH,
            actual: seed.len(),
        })?;

        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Read a seed file and rebuild the identity it holds
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and
    /// `CryptoError::BadSeedSize` if it is not exactly 32 bytes long
    pub fn load_seed<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_seed(&data)
    }

    /// Write the raw secret seed to `path`, readable and writable by the owner only
    pub fn save_seed<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path.as_ref())?;
        file.write_all(&self.seed_bytes())?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path.as_ref(), std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load the identity at `path`, generating and writing one back if the
    /// file does not exist. The flag is true when a new identity was created.
    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            return Ok((Self::load_seed(path)?, false));
        }

        let identity = Self::generate();
        identity.save_seed(path)?;
        log::info!("Generated new identity {}", identity.session_id());
        Ok((identity, true))
    }

    /// The secret seed
    pub fn seed_bytes(&self) -> [u8; SEED_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// The Ed25519 public key
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// The public verifying key
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Network-visible address of this identity
    pub fn session_id(&self) -> String {
        session_id_for(&self.public_key_bytes())
    }

    /// Sign a message with this identity
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Derive the X25519 keypair used to open sealed boxes addressed to us
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyConversion` if the public key is not a valid
    /// Edwards point, which cannot happen for generated or loaded identities
    pub fn curve_keys(&self) -> Result<CurveKeyPair> {
        let public = ed25519_to_x25519_public(&self.public_key_bytes())?;
        let secret = StaticSecret::from(ed25519_seed_to_x25519_secret(&self.seed_bytes()));

        Ok(CurveKeyPair {
            secret,
            public: X25519PublicKey::from(public),
        })
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.session_id())
    }
}

impl CurveKeyPair {
    /// X25519 public key bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// X25519 secret scalar bytes (already clamped)
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl fmt::Debug for CurveKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveKeyPair")
            .field("public", &hex::encode(self.public_bytes()))
            .finish_non_exhaustive()
    }
}

/// Map an Ed25519 public key to its X25519 (Montgomery u) form
///
/// # Errors
///
/// Returns `CryptoError::KeyConversion` if the bytes do not decode to an
/// Edwards point
pub fn ed25519_to_x25519_public(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Result<[u8; 32]> {
    let point = CompressedEdwardsY(*public_key)
        .decompress()
        .ok_or_else(|| CryptoError::KeyConversion {
            reason: format!("{} is not an Edwards point", hex::encode(public_key)),
        })?;

    Ok(point.to_montgomery().to_bytes())
}

/// SHA-512 of the seed, lower half clamped, as libsodium does
fn ed25519_seed_to_x25519_secret(seed: &[u8; SEED_LENGTH]) -> [u8; 32] {
    let digest = Sha512::digest(seed);
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}

/// Session ID for an Ed25519 public key
pub fn session_id_for(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    format!("{}{}", SESSION_ID_PREFIX, hex::encode(public_key))
}

/// Extract the Ed25519 public key from a session ID
///
/// # Errors
///
/// Returns `ProtocolError::InvalidSessionId` if the version tag is missing or
/// the remainder is not 32 bytes of hex
pub fn parse_session_id(session_id: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    let invalid = || ProtocolError::InvalidSessionId {
        session_id: session_id.to_string(),
    };

    let key_hex = session_id.strip_prefix(SESSION_ID_PREFIX).ok_or_else(invalid)?;
    let bytes = hex::decode(key_hex).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid().into())
}

/// Check an Ed25519 signature made by `public_key`
pub fn verify_signature(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let signature: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| CryptoError::SignatureVerification)?;
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::SignatureVerification)?;

    verifying_key
        .verify(message, &Signature::from_bytes(&signature))
        .map_err(|_| CryptoError::SignatureVerification.into())
}
