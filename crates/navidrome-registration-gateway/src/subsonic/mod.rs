//! Subsonic protocol support for talking to Navidrome.

mod auth;
mod client;
mod types;

pub use auth::{UpstreamCredential, SALT_LEN};
pub use client::{interpret_response, SubsonicClient, DEFAULT_FAILURE_MESSAGE};
pub use types::{
    Envelope, RoleSet, SubsonicError, SubsonicResponse, API_VERSION, CLIENT_NAME,
    SELF_REGISTERED_ROLES,
};
