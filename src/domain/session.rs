//! Session state and token types.

use serde::{Deserialize, Serialize};

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh";

/// Authorization state of a guarded session.
///
/// `Unknown` exists only until the first check resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unknown,
    Authorized,
    Unauthorized,
}

impl AuthState {
    /// What a protected view should do in this state.
    #[must_use]
    pub const fn access(self) -> Access {
        match self {
            Self::Unknown => Access::Pending,
            Self::Authorized => Access::Granted,
            Self::Unauthorized => Access::RedirectToLogin,
        }
    }

    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Authorized => write!(f, "authorized"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// Gate decision for protected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Still checking; render nothing protected.
    Pending,
    Granted,
    /// Send the user to the login entry point.
    RedirectToLogin,
}

/// Claims read from an access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub user_id: Option<u64>,
}

impl TokenClaims {
    /// Seconds of validity left at `now`; negative once expired.
    #[must_use]
    pub const fn remaining_secs(&self, now: i64) -> i64 {
        self.exp - now
    }

    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        self.exp < now
    }
}

/// Tokens issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Tokens issued by a refresh; the server may rotate the refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
