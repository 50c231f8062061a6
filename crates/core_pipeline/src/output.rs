//! Output artifacts
//!
//! `team.txt` / `enemy.txt` hold one name per line and double as the
//! persisted state of the current match.

use crate::error::OutputError;
use crate::types::Team;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

/// Overwrite the team's name file with `names`
pub fn write_team_file(dir: &Path, team: Team, names: &[String]) -> Result<PathBuf, OutputError> {
    ensure_dir(dir)?;
    let path = dir.join(team.file_name());
    let mut content = String::new();
    for name in names {
        content.push_str(name);
        content.push('\n');
    }
    fs::write(&path, content).map_err(|source| OutputError::Write {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), names = names.len(), "wrote team file");
    Ok(path)
}

/// Names from a team file; a missing file means no names
pub fn read_team_file(dir: &Path, team: Team) -> Result<Vec<String>, OutputError> {
    let path = dir.join(team.file_name());
    match fs::read_to_string(&path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(OutputError::Read { path, source }),
    }
}

/// Remove both team files. Returns the files that existed.
pub fn clear_team_files(dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    let mut removed = Vec::new();
    for team in Team::ALL {
        let path = dir.join(team.file_name());
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(OutputError::Write { path, source }),
        }
    }
    Ok(removed)
}

/// Save a normalized crop as `<team>.png` for inspection
pub fn save_crop(dir: &Path, team: Team, image: &DynamicImage) -> Result<PathBuf, OutputError> {
    ensure_dir(dir)?;
    let path = dir.join(team.crop_file_name());
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| OutputError::Image {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
