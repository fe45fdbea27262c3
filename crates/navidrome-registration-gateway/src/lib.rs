//! Navidrome Registration Gateway - self-service account creation.
//!
//! Navidrome only lets admins create users. This gateway accepts public
//! registration requests, validates them and creates the account through the
//! Subsonic `createUser` endpoint using admin token authentication.

pub mod api;
pub mod config;
pub mod error;
pub mod subsonic;
pub mod validation;

pub use config::Config;
pub use error::GatewayError;
pub use subsonic::{SubsonicClient, UpstreamCredential};
pub use validation::Registration;
