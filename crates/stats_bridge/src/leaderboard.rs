//! MechWarrior Online leaderboard client
//!
//! Log in once with a cookie-keeping client, then look players up on the
//! quickplay leaderboard. Only [`LeaderboardSession`] implements
//! [`StatsSource`], and the only way to get one is [`LeaderboardClient::login`].

use crate::error::{FetchError, LoginError};
use crate::html::{find_player_row, find_table_with_class};
use crate::source::StatsSource;
use async_trait::async_trait;
use core_pipeline::config::EnrichmentConfig;
use core_pipeline::StatsRecord;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

pub const EMAIL_VAR: &str = "ROSTERSCAN_EMAIL";
pub const PASSWORD_VAR: &str = "ROSTERSCAN_PASSWORD";

const LOGIN_PATH: &str = "/do/login";
const QUICKPLAY_PATH: &str = "/profile/leaderboards/quickplay";
const LOGIN_RETURN: &str = "/profile/leaderboards/quickplay?type=0";
const RESULTS_TABLE_CLASS: &str = "table-striped";
/// rank, name, wins, losses, W/L, kills, deaths, K/D, games, avg score
const RESULT_COLUMNS: usize = 10;

/// Account used to log in to the leaderboard
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Read `ROSTERSCAN_EMAIL` / `ROSTERSCAN_PASSWORD`
    pub fn from_env() -> Result<Self, LoginError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoginError> {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(LoginError::MissingCredentials(key))
        };
        Ok(Self::new(get(EMAIL_VAR)?, get(PASSWORD_VAR)?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the leaderboard client
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    /// Site root (default: https://mwomercs.com)
    pub base_url: String,
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for LeaderboardConfig {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            base_url: config.leaderboard_url.trim_end_matches('/').to_string(),
            timeout_secs: config.fetch_timeout_secs,
        }
    }
}

/// Not yet logged in
pub struct LeaderboardClient {
    config: LeaderboardConfig,
    client: reqwest::Client,
}

impl LeaderboardClient {
    pub fn new(config: LeaderboardConfig) -> Result<Self, LoginError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Log in; the session cookie stays in the returned handle.
    ///
    /// The site answers a bad login with its sign-in page rather than an
    /// error status, so a response still offering "Sign in" is a rejection.
    pub async fn login(self, credentials: &Credentials) -> Result<LeaderboardSession, LoginError> {
        let url = format!("{}{}", self.config.base_url, LOGIN_PATH);
        debug!(%url, email = %credentials.email, "logging in");

        let body = self
            .client
            .post(&url)
            .form(&[
                ("email", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("return", LOGIN_RETURN),
            ])
            .send()
            .await?
            .text()
            .await?;

        if body.contains("Sign in") {
            return Err(LoginError::Rejected);
        }

        info!(email = %credentials.email, "logged in to leaderboard");
        Ok(LeaderboardSession {
            config: self.config,
            client: self.client,
        })
    }
}

/// An authenticated leaderboard session, shared read-only by fetches
pub struct LeaderboardSession {
    config: LeaderboardConfig,
    client: reqwest::Client,
}

#[async_trait]
impl StatsSource for LeaderboardSession {
    async fn fetch(&self, name: &str) -> Result<Option<StatsRecord>, FetchError> {
        let url = format!("{}{}", self.config.base_url, QUICKPLAY_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("type", "0"), ("user", name)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        parse_leaderboard(&body, name)
    }
}

/// Find `name` on a quickplay leaderboard page
pub fn parse_leaderboard(html: &str, name: &str) -> Result<Option<StatsRecord>, FetchError> {
    let Some(table) = find_table_with_class(html, RESULTS_TABLE_CLASS) else {
        debug!(player = name, "no results table on leaderboard page");
        return Ok(None);
    };
    match find_player_row(table, name) {
        Some(cells) => record_from_cells(cells).map(Some),
        None => Ok(None),
    }
}

fn record_from_cells(cells: Vec<String>) -> Result<StatsRecord, FetchError> {
    if cells.len() < RESULT_COLUMNS {
        return Err(FetchError::Malformed(format!(
            "expected {} columns, found {}",
            RESULT_COLUMNS,
            cells.len()
        )));
    }
    let mut cells = cells.into_iter();
    let mut next = || cells.next().unwrap_or_default();
    let rank = next();
    let _name = next();
    Ok(StatsRecord {
        rank,
        wins: next(),
        losses: next(),
        win_loss_ratio: next(),
        kills: next(),
        deaths: next(),
        kill_death_ratio: next(),
        games_played: next(),
        average_score: next(),
    })
}
