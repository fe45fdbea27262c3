//! Subsonic API wire types.

use serde::{Deserialize, Serialize};

/// Protocol version sent as `v`.
pub const API_VERSION: &str = "1.16.1";

/// Client name sent as `c`.
pub const CLIENT_NAME: &str = "navidrome-registration-gateway";

/// Authentication query parameters shared by every Subsonic call.
#[derive(Debug, Serialize)]
pub struct AuthParams<'a> {
    pub u: &'a str,
    pub t: &'a str,
    pub s: &'a str,
    pub v: &'static str,
    pub c: &'static str,
    pub f: &'static str,
}

/// User fields for `createUser`, passed through as submitted.
#[derive(Serialize)]
pub struct CreateUserParams<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
}

/// Capabilities granted to every self-registered account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSet {
    pub admin_role: bool,
    pub settings_role: bool,
    pub stream_role: bool,
    pub jukebox_role: bool,
    pub download_role: bool,
    pub upload_role: bool,
    pub playlist_role: bool,
    pub cover_art_role: bool,
    pub comment_role: bool,
    pub podcast_role: bool,
    pub share_role: bool,
}

/// Regular listener: no administration, settings or jukebox control.
pub const SELF_REGISTERED_ROLES: RoleSet = RoleSet {
    admin_role: false,
    settings_role: false,
    stream_role: true,
    jukebox_role: false,
    download_role: true,
    upload_role: true,
    playlist_role: true,
    cover_art_role: true,
    comment_role: true,
    podcast_role: true,
    share_role: true,
};

/// Top-level JSON body: `{"subsonic-response": {...}}`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse,
}

#[derive(Debug, Deserialize)]
pub struct SubsonicResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<SubsonicError>,
}

impl SubsonicResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Human-readable error message, if the server sent one.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct SubsonicError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}
