//! Roster model
//!
//! The current match (own and opposing team lists) plus the persistent
//! friend registry that accumulates notes and statistics across matches.

use crate::error::RegistryError;
use crate::types::{RosterEntry, StatsLookup, Team};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

static RANK_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Leaderboard position. Orders `Ranked` ascending, then `Unranked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Ranked(u32),
    Unranked,
}

/// Pull `Rank: <digits>` out of free text
pub fn rank_of(text: &str) -> Rank {
    let pattern = RANK_PATTERN.get_or_init(|| Regex::new(r"Rank: (\d+)").expect("rank regex"));
    pattern
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .map(Rank::Ranked)
        .unwrap_or(Rank::Unranked)
}

/// What the registry knows about one player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendEntry {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub stats: Option<StatsLookup>,
}

impl FriendEntry {
    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            stats: None,
        }
    }

    /// Stats line followed by the user's notes, whichever are present
    pub fn summary(&self) -> String {
        let stats = self.stats.as_ref().map(ToString::to_string);
        let notes = Some(self.notes.trim()).filter(|n| !n.is_empty());
        match (stats, notes) {
            (Some(s), Some(n)) => format!("{} | {}", s, n),
            (Some(s), None) => s,
            (None, Some(n)) => n.to_string(),
            (None, None) => String::new(),
        }
    }

    pub fn rank(&self) -> Rank {
        rank_of(&self.summary())
    }
}

fn validated_name(name: &str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    Ok(name.to_string())
}

/// Persistent `name -> FriendEntry` map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FriendRegistry {
    entries: BTreeMap<String, FriendEntry>,
}

impl FriendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            debug!(path = %path.display(), "no friend registry yet, starting empty");
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry: Self =
            serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), friends = registry.len(), "loaded friend registry");
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let write_err = |source| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)?;
        debug!(path = %path.display(), friends = self.len(), "saved friend registry");
        Ok(())
    }

    /// Insert an empty entry unless `name` is already known.
    ///
    /// Returns true when an entry was created.
    pub fn upsert_empty(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), FriendEntry::default());
        true
    }

    pub fn add(&mut self, name: &str, notes: &str) -> Result<(), RegistryError> {
        let name = validated_name(name)?;
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateFriend(name));
        }
        self.entries.insert(name, FriendEntry::with_notes(notes));
        Ok(())
    }

    pub fn set_notes(&mut self, name: &str, notes: &str) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownFriend(name.to_string()))?;
        entry.notes = notes.to_string();
        Ok(())
    }

    /// Move an entry to a new name, keeping notes and stats
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), RegistryError> {
        let new = validated_name(new)?;
        if new == old {
            return Ok(());
        }
        if self.entries.contains_key(&new) {
            return Err(RegistryError::DuplicateFriend(new));
        }
        let entry = self
            .entries
            .remove(old)
            .ok_or_else(|| RegistryError::UnknownFriend(old.to_string()))?;
        self.entries.insert(new, entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<FriendEntry, RegistryError> {
        self.entries
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownFriend(name.to_string()))
    }

    /// Record a fetch outcome, creating the entry when needed
    pub fn merge_lookup(&mut self, name: &str, lookup: StatsLookup) {
        self.entries.entry(name.to_string()).or_default().stats = Some(lookup);
    }

    pub fn get(&self, name: &str) -> Option<&FriendEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FriendEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, by rank then name
    pub fn ranked(&self) -> Vec<(&str, &FriendEntry)> {
        let mut all: Vec<_> = self.iter().collect();
        all.sort_by_key(|(name, entry)| (entry.rank(), *name));
        all
    }
}

/// The current match plus the friend registry
#[derive(Debug, Clone, Default)]
pub struct Roster {
    own: Vec<RosterEntry>,
    opposing: Vec<RosterEntry>,
    friends: FriendRegistry,
}

impl Roster {
    pub fn new(friends: FriendRegistry) -> Self {
        Self {
            own: Vec::new(),
            opposing: Vec::new(),
            friends,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut Vec<RosterEntry> {
        match team {
            Team::Own => &mut self.own,
            Team::Opposing => &mut self.opposing,
        }
    }

    pub fn team(&self, team: Team) -> &[RosterEntry] {
        match team {
            Team::Own => &self.own,
            Team::Opposing => &self.opposing,
        }
    }

    /// Replace a team with recognized names, seeding unseen names into
    /// the registry
    pub fn set_team_names<I, S>(&mut self, team: Team, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<RosterEntry> = names
            .into_iter()
            .map(|name| RosterEntry::recognized(name, team))
            .collect();
        for entry in &entries {
            self.friends.upsert_empty(&entry.name);
        }
        *self.team_mut(team) = entries;
        self.refresh_stats();
    }

    /// Append a manually typed player
    pub fn add_manual(&mut self, team: Team, name: &str) -> Result<(), RegistryError> {
        let name = validated_name(name)?;
        self.friends.upsert_empty(&name);
        let mut entry = RosterEntry::manual(name, team);
        entry.stats = self.stats_for(&entry.name);
        self.team_mut(team).push(entry);
        Ok(())
    }

    pub fn upsert_friend(&mut self, name: &str) -> bool {
        self.friends.upsert_empty(name)
    }

    fn stats_for(&self, name: &str) -> Option<StatsLookup> {
        self.friends.get(name).and_then(|f| f.stats.clone())
    }

    /// Rank as the registry knows it (stats or notes)
    pub fn rank_of_name(&self, name: &str) -> Rank {
        self.friends
            .get(name)
            .map(FriendEntry::rank)
            .unwrap_or(Rank::Unranked)
    }

    /// Team entries by rank, then name
    pub fn sorted_team(&self, team: Team) -> Vec<&RosterEntry> {
        let mut entries: Vec<&RosterEntry> = self.team(team).iter().collect();
        entries.sort_by(|a, b| {
            self.rank_of_name(&a.name)
                .cmp(&self.rank_of_name(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    /// Names listed on both teams, in own-team order
    pub fn cross_team_duplicates(&self) -> Vec<String> {
        let opposing: HashSet<&str> = self.opposing.iter().map(|e| e.name.as_str()).collect();
        let mut seen = HashSet::new();
        self.own
            .iter()
            .map(|e| e.name.as_str())
            .filter(|name| opposing.contains(name) && seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Copy registry stats onto the match entries
    pub fn refresh_stats(&mut self) {
        let Self {
            own,
            opposing,
            friends,
        } = self;
        for entry in own.iter_mut().chain(opposing.iter_mut()) {
            entry.stats = friends.get(&entry.name).and_then(|f| f.stats.clone());
        }
    }

    /// Start a new match; the registry is kept
    pub fn clear_match(&mut self) {
        self.own.clear();
        self.opposing.clear();
    }

    /// Distinct names in the current match, own team first
    pub fn match_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.own
            .iter()
            .chain(&self.opposing)
            .filter(|e| seen.insert(e.name.as_str()))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Registry entries not in the current match, rank-sorted
    pub fn other_friends(&self) -> Vec<(&str, &FriendEntry)> {
        let in_match: HashSet<&str> = self
            .own
            .iter()
            .chain(&self.opposing)
            .map(|e| e.name.as_str())
            .collect();
        self.friends
            .ranked()
            .into_iter()
            .filter(|(name, _)| !in_match.contains(name))
            .collect()
    }

    /// Case-insensitive search over names and entry text
    pub fn matches(&self, query: &str) -> Vec<(&str, &FriendEntry)> {
        let needle = query.trim().to_lowercase();
        self.friends
            .iter()
            .filter(|(name, entry)| {
                needle.is_empty()
                    || name.to_lowercase().contains(&needle)
                    || entry.summary().to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn friends(&self) -> &FriendRegistry {
        &self.friends
    }

    pub fn friends_mut(&mut self) -> &mut FriendRegistry {
        &mut self.friends
    }

    pub fn into_friends(self) -> FriendRegistry {
        self.friends
    }
}
