//! Error types for the roster pipeline
//!
//! One enum per concern. [`PipelineError`] is what a scan run reports per
//! region, and what aborts a run when the recognition engine is missing.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "region ({left}, {top}, {right}, {bottom}) must satisfy left < right and top < bottom"
    )]
    InvalidRegion {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },

    #[error("no region configured for `{0}`")]
    MissingRegion(String),

    #[error("invalid normalization setting: {0}")]
    InvalidNormalization(String),

    #[error("invalid enrichment setting: {0}")]
    InvalidEnrichment(String),

    #[error("recognition engine path {0} does not exist")]
    EnginePathMissing(PathBuf),

    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Region extraction failures
#[derive(Debug, Error)]
pub enum RegionError {
    #[error(
        "region `{id}` {rect} exceeds frame bounds {frame_width}x{frame_height}"
    )]
    OutOfBounds {
        id: String,
        rect: String,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Text recognition failures
#[derive(Debug, Error)]
pub enum RecognizeError {
    /// The engine cannot be located or launched. This is a deployment
    /// problem, not "no text found".
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("recognition failed: {0}")]
    Failed(String),

    #[error("failed to stage image for recognition: {0}")]
    Staging(#[from] std::io::Error),

    #[error("failed to encode image for recognition: {0}")]
    Encode(#[from] image::ImageError),
}

impl RecognizeError {
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, RecognizeError::EngineUnavailable(_))
    }
}

/// Output artifact failures
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to save image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Friend registry persistence and edit failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read friend registry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write friend registry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("friend registry {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("`{0}` is not in the friend registry")]
    UnknownFriend(String),

    #[error("`{0}` is already in the friend registry")]
    DuplicateFriend(String),

    #[error("friend name must not be empty")]
    EmptyName,
}

/// Errors surfaced by a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Recognition(#[from] RecognizeError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl PipelineError {
    /// Errors that must stop the whole run rather than a single region
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Recognition(e) => e.is_engine_unavailable(),
            PipelineError::Configuration(_) => true,
            _ => false,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
