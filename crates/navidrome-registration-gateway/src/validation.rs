//! Registration input validation.
//!
//! Rules are checked in order and the first failure wins. Input is never
//! trimmed or case-folded; username uniqueness is left to Navidrome.

use crate::error::GatewayError;
use secrecy::{ExposeSecret, SecretString};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 8;

/// A registration that passed validation.
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub password: SecretString,
    pub email: String,
}

impl Registration {
    /// Validate raw request fields.
    pub fn validate(
        username: Option<String>,
        password: Option<SecretString>,
        email: Option<String>,
    ) -> Result<Self, GatewayError> {
        let (username, password, email) = match (username, password, email) {
            (Some(u), Some(p), Some(e))
                if !u.is_empty() && !p.expose_secret().is_empty() && !e.is_empty() =>
            {
                (u, p, e)
            }
            _ => return Err(GatewayError::MissingFields),
        };

        if !is_valid_username(&username) {
            return Err(GatewayError::InvalidUsername);
        }

        if !is_strong_password(password.expose_secret()) {
            return Err(GatewayError::WeakPassword);
        }

        if !is_valid_email(&email) {
            return Err(GatewayError::InvalidEmail);
        }

        Ok(Self {
            username,
            password,
            email,
        })
    }
}

/// 3-20 characters from `[A-Za-z0-9_-]`.
pub fn is_valid_username(username: &str) -> bool {
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// At least 8 characters, counted in UTF-16 code units like browser clients do.
pub fn is_strong_password(password: &str) -> bool {
    password.encode_utf16().count() >= PASSWORD_MIN_LEN
}

/// Permissive `local@domain.tld` shape check.
///
/// Neither side of the `@` may contain whitespace or another `@`, and the
/// domain needs a `.` with at least one character on each side of it.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let is_clean = |part: &str| {
        !part.is_empty() && !part.chars().any(|c| c == '@' || c.is_whitespace())
    };
    if !is_clean(local) || !is_clean(domain) {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
