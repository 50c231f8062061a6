//! Error types for the statistics provider

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single player's statistics could not be fetched.
///
/// Every variant is transient from the roster's point of view and is
/// recorded as `FetchFailed`. "No such player" is not an error; sources
/// return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("leaderboard returned {0}")]
    Status(StatusCode),

    #[error("unexpected leaderboard page: {0}")]
    Malformed(String),

    #[error("fetch timed out after {0}s")]
    Timeout(u64),
}

/// Failure to establish the authenticated session
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("missing credentials: set {0}")]
    MissingCredentials(&'static str),

    #[error("login request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login rejected; check e-mail and password")]
    Rejected,
}
