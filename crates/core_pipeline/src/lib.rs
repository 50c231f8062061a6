//! Core pipeline for rosterscan
//!
//! This crate turns a screenshot of an in-game match roster into player
//! names: region cropping, deterministic image normalization, text
//! recognition and name cleanup, plus the roster model and friend
//! registry the names feed into.

pub mod config;
pub mod error;
pub mod names;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod region;
pub mod roster;
pub mod types;

pub use config::AppConfig;
pub use error::*;
pub use names::{extract_names, NameExtractor};
pub use ocr::{TesseractCli, TextRecognizer};
pub use pipeline::{PipelineRun, RosterPipeline};
pub use roster::{rank_of, FriendEntry, FriendRegistry, Rank, Roster};
pub use types::*;
