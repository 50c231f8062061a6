//! Core types for the roster pipeline
//!
//! Regions, teams, roster entries and the statistics payload that flows
//! from the enrichment engine into the friend registry.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the match a roster belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The player's own team
    Own,
    /// The opposing team
    Opposing,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Own, Team::Opposing];

    /// Region id used for this team's rectangle
    pub fn region_id(self) -> &'static str {
        match self {
            Team::Own => "team",
            Team::Opposing => "enemy",
        }
    }

    /// Name of the plain-text output artifact for this team
    pub fn file_name(self) -> &'static str {
        match self {
            Team::Own => "team.txt",
            Team::Opposing => "enemy.txt",
        }
    }

    /// Name of the debug crop written by `scan --save-crops`
    pub fn crop_file_name(self) -> &'static str {
        match self {
            Team::Own => "team.png",
            Team::Opposing => "enemy.png",
        }
    }

    /// Inverse of [`Team::region_id`]
    pub fn from_region_id(id: &str) -> Option<Self> {
        Team::ALL.into_iter().find(|team| team.region_id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            Team::Own => "Your Team",
            Team::Opposing => "Your Enemy",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pixel rectangle `(left, top, right, bottom)`, right/bottom exclusive.
///
/// Always satisfies `left < right` and `top < bottom`. Serialized as a
/// four-element array so stored settings stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct RegionBox {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl RegionBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, ConfigError> {
        if left >= right || top >= bottom {
            return Err(ConfigError::InvalidRegion {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// True when the whole rectangle lies inside a `width` x `height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right <= width && self.bottom <= height
    }
}

impl TryFrom<[u32; 4]> for RegionBox {
    type Error = ConfigError;

    fn try_from([left, top, right, bottom]: [u32; 4]) -> Result<Self, Self::Error> {
        Self::new(left, top, right, bottom)
    }
}

impl From<RegionBox> for [u32; 4] {
    fn from(b: RegionBox) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

impl fmt::Display for RegionBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// A named rectangle to cut out of a full frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub id: String,
    pub rect: RegionBox,
}

impl RegionSpec {
    pub fn new(id: impl Into<String>, rect: RegionBox) -> Self {
        Self {
            id: id.into(),
            rect,
        }
    }
}

/// How a roster entry got into the match view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Produced by the recognition pipeline
    Recognized,
    /// Typed in by the user
    Manual,
}

/// Leaderboard statistics for one player, as free text from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub rank: String,
    pub wins: String,
    pub losses: String,
    pub win_loss_ratio: String,
    pub kills: String,
    pub deaths: String,
    pub kill_death_ratio: String,
    pub games_played: String,
    pub average_score: String,
}

impl fmt::Display for StatsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rank: {}, W: {}, L: {}, W/L: {}, K: {}, D: {}, K/D: {}, Games: {}, Avg Score: {}",
            self.rank,
            self.wins,
            self.losses,
            self.win_loss_ratio,
            self.kills,
            self.deaths,
            self.kill_death_ratio,
            self.games_played,
            self.average_score
        )
    }
}

/// Outcome of a statistics fetch.
///
/// `Option<StatsLookup>::None` at the use site means "never fetched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatsLookup {
    /// The provider returned a record
    Found(StatsRecord),
    /// The provider has no public record for this name
    NotFound,
    /// Transient failure (network, timeout, malformed page); retry later
    FetchFailed,
}

impl StatsLookup {
    pub fn record(&self) -> Option<&StatsRecord> {
        match self {
            StatsLookup::Found(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Display for StatsLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsLookup::Found(record) => record.fmt(f),
            StatsLookup::NotFound => f.write_str("NOT FOUND"),
            StatsLookup::FetchFailed => f.write_str("ERROR"),
        }
    }
}

/// One player in the current match view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub team: Team,
    pub source: EntrySource,
    pub stats: Option<StatsLookup>,
}

impl RosterEntry {
    pub fn recognized(name: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            team,
            source: EntrySource::Recognized,
            stats: None,
        }
    }

    pub fn manual(name: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            team,
            source: EntrySource::Manual,
            stats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(rank: &str) -> StatsRecord {
        StatsRecord {
            rank: rank.to_string(),
            wins: "3".to_string(),
            losses: "1".to_string(),
            win_loss_ratio: "3.00".to_string(),
            kills: "12".to_string(),
            deaths: "4".to_string(),
            kill_death_ratio: "3.00".to_string(),
            games_played: "4".to_string(),
            average_score: "350".to_string(),
        }
    }

    #[test]
    fn test_region_box_rejects_empty_or_inverted() {
        assert!(RegionBox::new(10, 10, 10, 20).is_err());
        assert!(RegionBox::new(10, 20, 30, 5).is_err());
        assert!(RegionBox::new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_region_box_serializes_as_array() {
        let rect = RegionBox::new(50, 150, 400, 450).unwrap();
        let json = serde_json::to_string(&rect).unwrap();
        assert_eq!(json, "[50,150,400,450]");

        let back: RegionBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rect);
        assert_eq!(back.width(), 350);
        assert_eq!(back.height(), 300);
    }

    #[test]
    fn test_region_box_deserialize_enforces_invariant() {
        let result: Result<RegionBox, _> = serde_json::from_str("[400,150,50,450]");
        assert!(result.is_err());
    }

    #[test]
    fn test_stats_record_display_matches_rank_pattern() {
        let text = sample_record("42").to_string();
        assert!(text.starts_with("Rank: 42, W: 3, L: 1, W/L: 3.00"));
        assert!(text.ends_with("Games: 4, Avg Score: 350"));
    }

    #[test]
    fn test_stats_lookup_sentinels_display() {
        assert_eq!(StatsLookup::NotFound.to_string(), "NOT FOUND");
        assert_eq!(StatsLookup::FetchFailed.to_string(), "ERROR");
    }

    #[test]
    fn test_stats_lookup_serialization() {
        let lookup = StatsLookup::NotFound;
        let json = serde_json::to_string(&lookup).unwrap();
        let back: StatsLookup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lookup);
    }

    #[test]
    fn test_team_region_ids_round_trip() {
        for team in Team::ALL {
            assert_eq!(Team::from_region_id(team.region_id()), Some(team));
        }
        assert_eq!(Team::Own.file_name(), "team.txt");
        assert_eq!(Team::Opposing.file_name(), "enemy.txt");
    }
}
