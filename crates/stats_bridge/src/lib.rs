//! Stats bridge for leaderboard enrichment
//!
//! Fetches per-player statistics from the MechWarrior Online leaderboard
//! and merges them into the friend registry, many names at a time.

pub mod enrich;
pub mod error;
pub mod html;
pub mod leaderboard;
pub mod source;

pub use enrich::{EnrichmentEngine, EnrichmentReport, SharedRegistry};
pub use error::{FetchError, LoginError};
pub use leaderboard::{Credentials, LeaderboardClient, LeaderboardConfig, LeaderboardSession};
pub use source::StatsSource;
