//! Opaque random tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rootcause::prelude::Report;

use crate::error::RandomSourceError;

/// Number of random bytes behind every token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generates a URL-safe token from the operating system's random source.
///
/// # Errors
///
/// Returns an error if the random source is unavailable.
pub fn random_token() -> Result<String, Report<RandomSourceError>> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| RandomSourceError {
        reason: e.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
