//! Configuration
//!
//! Settings are a plain value loaded from `config.json` and handed to each
//! component at construction. Every field has a serde default so older or
//! partial files keep loading.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{RegionBox, RegionSpec, Team};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How the adaptive threshold computes its local mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Plain box mean over the block
    Mean,
    /// Gaussian-weighted mean over the block
    Gaussian,
}

/// Image normalization settings, tuned for small low-contrast overlay text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub grayscale: bool,
    /// Multiplicative contrast factor (1.0 = unchanged)
    pub contrast_factor: f32,
    /// Multiplicative sharpness factor (1.0 = unchanged)
    pub sharpness_factor: f32,
    /// Median filter radius in pixels; 1 is a 3x3 window, 0 disables
    pub denoise_radius: u32,
    pub binarize: bool,
    pub threshold_method: ThresholdMethod,
    /// Side of the local threshold window, odd and >= 3
    pub threshold_block_size: u32,
    /// Offset subtracted from the local mean
    pub threshold_constant: f32,
    /// Invert after thresholding so dark glyphs become 255 strokes
    pub invert: bool,
    /// One 3x3 dilation pass over the binarized strokes
    pub dilate: bool,
    /// Final resize factor (1.0 = unchanged)
    pub upscale_factor: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            grayscale: true,
            contrast_factor: 2.0,
            sharpness_factor: 2.0,
            denoise_radius: 1,
            binarize: true,
            threshold_method: ThresholdMethod::Gaussian,
            threshold_block_size: 11,
            threshold_constant: 2.0,
            invert: true,
            dilate: false,
            upscale_factor: 2.0,
        }
    }
}

impl NormalizationConfig {
    /// Every stage switched off; `normalize` only converts to luminance
    pub fn passthrough() -> Self {
        Self {
            grayscale: true,
            contrast_factor: 1.0,
            sharpness_factor: 1.0,
            denoise_radius: 0,
            binarize: false,
            threshold_method: ThresholdMethod::Gaussian,
            threshold_block_size: 11,
            threshold_constant: 0.0,
            invert: false,
            dilate: false,
            upscale_factor: 1.0,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("contrast_factor", self.contrast_factor),
            ("sharpness_factor", self.sharpness_factor),
            ("upscale_factor", self.upscale_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidNormalization(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.threshold_constant.is_finite() {
            return Err(ConfigError::InvalidNormalization(
                "threshold_constant must be finite".to_string(),
            ));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(ConfigError::InvalidNormalization(format!(
                "threshold_block_size must be odd and >= 3, got {}",
                self.threshold_block_size
            )));
        }
        Ok(())
    }
}

/// Page segmentation mode passed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    OsdOnly,
    AutoWithOsd,
    Auto,
    SingleColumn,
    /// One uniform block of text (line-per-name rosters)
    SingleBlock,
    SingleLine,
    SingleWord,
    /// Sparse text, line oriented, no particular order
    SparseLines,
    SparseLinesWithOsd,
    RawLine,
}

impl EngineMode {
    /// Tesseract `--psm` value
    pub fn psm(self) -> u8 {
        match self {
            EngineMode::OsdOnly => 0,
            EngineMode::AutoWithOsd => 1,
            EngineMode::Auto => 3,
            EngineMode::SingleColumn => 4,
            EngineMode::SingleBlock => 6,
            EngineMode::SingleLine => 7,
            EngineMode::SingleWord => 8,
            EngineMode::SparseLines => 11,
            EngineMode::SparseLinesWithOsd => 12,
            EngineMode::RawLine => 13,
        }
    }
}

/// Recognizer operating mode (Tesseract `--oem`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngineMode {
    Legacy,
    Lstm,
    Combined,
    Default,
}

impl OcrEngineMode {
    pub fn oem(self) -> u8 {
        match self {
            OcrEngineMode::Legacy => 0,
            OcrEngineMode::Lstm => 1,
            OcrEngineMode::Combined => 2,
            OcrEngineMode::Default => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub engine_mode: EngineMode,
    pub ocr_engine: OcrEngineMode,
    pub preserve_spacing: bool,
    pub language: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            engine_mode: EngineMode::SingleBlock,
            ocr_engine: OcrEngineMode::Default,
            preserve_spacing: true,
            language: "eng".to_string(),
        }
    }
}

/// Character-confusion corrections applied to recognized lines.
///
/// These encode assumptions about the game's name alphabet, so each rule
/// can be switched off or retargeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Characters removed wherever they appear
    pub noise_chars: String,
    /// Isolated `i` / `I` tokens become lowercase `i`
    pub isolated_i: bool,
    /// Letter substituted for an isolated `O` or a `0` with no digit
    /// neighbour; `None` disables the rule
    pub zero_letter: Option<char>,
    /// Drop repeated names (first occurrence wins)
    pub dedupe: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            noise_chars: ";:".to_string(),
            isolated_i: true,
            zero_letter: Some('D'),
            dedupe: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Fetches allowed in flight at once
    pub max_concurrency: usize,
    /// Per-fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Leaderboard site root
    pub leaderboard_url: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            fetch_timeout_secs: 15,
            leaderboard_url: "https://mwomercs.com".to_string(),
        }
    }
}

impl EnrichmentConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidEnrichment(
                "max_concurrency must be > 0".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidEnrichment(
                "fetch_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Screen rectangles holding each team's name column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamRegions {
    pub own: Option<RegionBox>,
    pub opposing: Option<RegionBox>,
}

impl Default for TeamRegions {
    fn default() -> Self {
        Self {
            own: RegionBox::new(50, 150, 400, 450).ok(),
            opposing: RegionBox::new(650, 150, 1000, 450).ok(),
        }
    }
}

impl TeamRegions {
    pub fn get(&self, team: Team) -> Option<RegionBox> {
        match team {
            Team::Own => self.own,
            Team::Opposing => self.opposing,
        }
    }

    pub fn set(&mut self, team: Team, rect: RegionBox) {
        match team {
            Team::Own => self.own = Some(rect),
            Team::Opposing => self.opposing = Some(rect),
        }
    }

    /// Region specs for both teams, in team order
    pub fn specs(&self) -> ConfigResult<Vec<RegionSpec>> {
        Team::ALL
            .into_iter()
            .map(|team| {
                self.get(team)
                    .map(|rect| RegionSpec::new(team.region_id(), rect))
                    .ok_or_else(|| ConfigError::MissingRegion(team.region_id().to_string()))
            })
            .collect()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tesseract executable, or the directory holding it
    pub engine_path: Option<PathBuf>,
    /// Where `team.txt` / `enemy.txt` are written
    pub output_dir: PathBuf,
    /// Friend registry file; defaults next to the config file
    pub friends_path: Option<PathBuf>,
    /// The player's own in-game name; its registry entry heads the match
    /// listing and is always looked up during enrichment
    pub username: String,
    pub regions: TeamRegions,
    /// Run the normalizer before recognition
    pub preprocess: bool,
    pub normalization: NormalizationConfig,
    pub recognition: RecognitionConfig,
    pub corrections: CorrectionConfig,
    pub enrichment: EnrichmentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_path: None,
            output_dir: PathBuf::from("."),
            friends_path: None,
            username: String::new(),
            regions: TeamRegions::default(),
            preprocess: true,
            normalization: NormalizationConfig::default(),
            recognition: RecognitionConfig::default(),
            corrections: CorrectionConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Write configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.normalization.validate()?;
        self.enrichment.validate()?;
        Ok(())
    }

    /// Configured engine path, which must exist when set
    pub fn checked_engine_path(&self) -> ConfigResult<Option<&Path>> {
        match &self.engine_path {
            Some(path) if !path.exists() => Err(ConfigError::EnginePathMissing(path.clone())),
            other => Ok(other.as_deref()),
        }
    }

    /// Friend registry location, next to the config file unless overridden
    pub fn friends_path_for(&self, config_path: &Path) -> PathBuf {
        self.friends_path.clone().unwrap_or_else(|| {
            config_path
                .parent()
                .map(|dir| dir.join("friends.json"))
                .unwrap_or_else(|| PathBuf::from("friends.json"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_overlay_tuning() {
        let config = NormalizationConfig::default();
        assert_eq!(config.contrast_factor, 2.0);
        assert_eq!(config.sharpness_factor, 2.0);
        assert_eq!(config.threshold_block_size, 11);
        assert_eq!(config.threshold_constant, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_even_block_size_rejected() {
        let config = NormalizationConfig {
            threshold_block_size: 10,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNormalization(_))
        ));
    }

    #[test]
    fn test_zero_upscale_rejected() {
        let config = NormalizationConfig {
            upscale_factor: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_mode_psm_values() {
        assert_eq!(EngineMode::SingleBlock.psm(), 6);
        assert_eq!(EngineMode::SparseLines.psm(), 11);
        assert_eq!(OcrEngineMode::Default.oem(), 3);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"username": "KalSinn", "regions": {"own": [0, 0, 100, 200]}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.username, "KalSinn");
        assert_eq!(config.regions.own, RegionBox::new(0, 0, 100, 200).ok());
        assert_eq!(config.regions.opposing, TeamRegions::default().opposing);
        assert_eq!(config.recognition.engine_mode, EngineMode::SingleBlock);
    }

    #[test]
    fn test_cleared_region_is_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"regions": {"opposing": null}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(matches!(
            config.regions.specs(),
            Err(ConfigError::MissingRegion(id)) if id == "enemy"
        ));
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_inverted_region_in_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"regions": {"own": [100, 0, 50, 200]}}"#).unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config
            .regions
            .set(Team::Opposing, RegionBox::new(1, 2, 3, 4).unwrap());
        config.corrections.zero_letter = Some('Q');
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_specs_cover_both_teams() {
        let specs = TeamRegions::default().specs().unwrap();
        let ids: Vec<_> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["team", "enemy"]);
    }

    #[test]
    fn test_friends_path_defaults_next_to_config() {
        let config = AppConfig::default();
        let path = config.friends_path_for(Path::new("/tmp/rosterscan/config.json"));
        assert_eq!(path, PathBuf::from("/tmp/rosterscan/friends.json"));
    }

    #[test]
    fn test_missing_engine_path_is_configuration_error() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        assert!(config.checked_engine_path().unwrap().is_none());

        config.engine_path = Some(dir.path().join("gone"));
        assert!(matches!(
            config.checked_engine_path(),
            Err(ConfigError::EnginePathMissing(_))
        ));

        config.engine_path = Some(dir.path().to_path_buf());
        assert_eq!(config.checked_engine_path().unwrap(), Some(dir.path()));
    }
}
