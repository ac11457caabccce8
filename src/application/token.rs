//! Access token decoding.
//!
//! Reads the claims segment of a JWT without verifying the signature; the
//! server verifies on every request, the client only needs `exp` and
//! `user_id` to schedule refreshes and look up the current user.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::domain::{AppError, Result, TokenClaims};

/// Decodes the payload claims of a compact JWT (`header.payload.signature`).
///
/// # Errors
///
/// Returns `AppError::Decode` if the token does not have three segments, the
/// payload is not base64url, or the JSON lacks a numeric `exp`.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(AppError::decode("invalid token format"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| AppError::decode("invalid token payload"))?;

    serde_json::from_slice::<TokenClaims>(&payload)
        .map_err(|e| AppError::decode(format!("invalid token claims: {e}")))
}
