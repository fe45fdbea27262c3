//! Subsonic token authentication.
//!
//! Each call carries `t = md5(password + s)` for a fresh random salt `s`, so
//! the admin password itself never goes over the wire.

use md5::{Digest, Md5};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

/// Salt length in bytes before hex encoding.
pub const SALT_LEN: usize = 16;

/// One-time salt and token pair for a single upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamCredential {
    pub salt: String,
    pub token: String,
}

impl UpstreamCredential {
    /// Generate a credential with a new random salt.
    pub fn generate(password: &SecretString) -> Self {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        Self::with_salt(password, hex::encode(salt_bytes))
    }

    /// Compute the token for a known salt.
    pub fn with_salt(password: &SecretString, salt: String) -> Self {
        let mut hasher = Md5::new();
        hasher.update(password.expose_secret().as_bytes());
        hasher.update(salt.as_bytes());
        let token = hex::encode(hasher.finalize());

        Self { salt, token }
    }
}
