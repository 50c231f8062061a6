//! Roster acquisition pipeline
//!
//! frame -> regions -> normalize -> recognize -> names. Regions are
//! processed one after another; a failure stays with its region unless the
//! recognition engine itself is missing.

use crate::config::{AppConfig, NormalizationConfig, RecognitionConfig};
use crate::error::{OutputError, PipelineError, RecognizeError};
use crate::names::NameExtractor;
use crate::ocr::TextRecognizer;
use crate::output;
use crate::preprocess::normalize;
use crate::region::extract_regions;
use crate::roster::Roster;
use crate::types::{RegionSpec, Team};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result for one region of a run
#[derive(Debug)]
pub struct RegionOutcome {
    pub region_id: String,
    /// Image handed to the recognizer, when cropping succeeded
    pub normalized: Option<DynamicImage>,
    pub names: Result<Vec<String>, PipelineError>,
}

impl RegionOutcome {
    pub fn team(&self) -> Option<Team> {
        Team::from_region_id(&self.region_id)
    }
}

/// Everything a run produced, in region order
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub regions: Vec<RegionOutcome>,
}

impl PipelineRun {
    pub fn regions_extracted(&self) -> usize {
        self.regions.iter().filter(|r| r.normalized.is_some()).count()
    }

    pub fn names_recognized(&self) -> usize {
        self.regions
            .iter()
            .filter_map(|r| r.names.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.regions
            .iter()
            .filter_map(|r| r.names.as_ref().err().map(|e| (r.region_id.as_str(), e)))
    }

    /// Names recognized for a team, if its region succeeded
    pub fn names_for(&self, team: Team) -> Option<&[String]> {
        self.regions
            .iter()
            .find(|r| r.team() == Some(team))
            .and_then(|r| r.names.as_deref().ok())
    }

    /// Replace each successfully recognized team in `roster`
    pub fn apply_to(&self, roster: &mut Roster) {
        for team in Team::ALL {
            if let Some(names) = self.names_for(team) {
                roster.set_team_names(team, names.iter().cloned());
            }
        }
    }

    /// Write name files for every successful team region.
    ///
    /// Write failures are reported per team; the run keeps its names.
    pub fn write_outputs(&self, dir: &Path) -> Vec<(Team, Result<PathBuf, OutputError>)> {
        Team::ALL
            .into_iter()
            .filter_map(|team| {
                self.names_for(team)
                    .map(|names| (team, output::write_team_file(dir, team, names)))
            })
            .collect()
    }

    /// Save the normalized crops as `team.png` / `enemy.png`
    pub fn save_crops(&self, dir: &Path) -> Vec<(Team, Result<PathBuf, OutputError>)> {
        self.regions
            .iter()
            .filter_map(|r| Some((r.team()?, r.normalized.as_ref()?)))
            .map(|(team, image)| (team, output::save_crop(dir, team, image)))
            .collect()
    }
}

/// Drives a [`TextRecognizer`] over the regions of a frame
pub struct RosterPipeline<R> {
    recognizer: R,
    normalization: Option<NormalizationConfig>,
    recognition: RecognitionConfig,
    extractor: NameExtractor,
}

impl<R: TextRecognizer> RosterPipeline<R> {
    pub fn new(recognizer: R, config: &AppConfig) -> Self {
        Self {
            recognizer,
            normalization: config.preprocess.then(|| config.normalization.clone()),
            recognition: config.recognition.clone(),
            extractor: NameExtractor::from_config(&config.corrections),
        }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Normalize (when enabled), recognize and extract names from one image
    pub fn recognize_image(
        &self,
        image: &DynamicImage,
    ) -> Result<(DynamicImage, Vec<String>), RecognizeError> {
        let prepared = match &self.normalization {
            Some(config) => normalize(image, config),
            None => image.clone(),
        };
        let raw = self.recognizer.recognize(&prepared, &self.recognition)?;
        let names = self.extractor.extract_names(&raw);
        debug!(
            lines = raw.lines().count(),
            names = names.len(),
            "recognized image"
        );
        Ok((prepared, names))
    }

    /// Process every region of `frame`.
    ///
    /// Returns `Err` only for failures that make the rest of the run
    /// pointless (the engine is unavailable).
    pub fn run(
        &self,
        frame: &DynamicImage,
        regions: &[RegionSpec],
    ) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::default();

        for (region_id, crop) in extract_regions(frame, regions) {
            let outcome = match crop {
                Err(e) => {
                    warn!(region = %region_id, error = %e, "region skipped");
                    RegionOutcome {
                        region_id,
                        normalized: None,
                        names: Err(e.into()),
                    }
                }
                Ok(image) => self.process_region(region_id, &image)?,
            };
            run.regions.push(outcome);
        }

        log_summary(&run);
        Ok(run)
    }

    /// Treat the whole image as one team's roster
    pub fn run_whole(
        &self,
        image: &DynamicImage,
        team: Team,
    ) -> Result<PipelineRun, PipelineError> {
        let outcome = self.process_region(team.region_id().to_string(), image)?;
        let run = PipelineRun {
            regions: vec![outcome],
        };
        log_summary(&run);
        Ok(run)
    }

    fn process_region(
        &self,
        region_id: String,
        image: &DynamicImage,
    ) -> Result<RegionOutcome, PipelineError> {
        match self.recognize_image(image) {
            Ok((prepared, names)) => Ok(RegionOutcome {
                region_id,
                normalized: Some(prepared),
                names: Ok(names),
            }),
            Err(e) if e.is_engine_unavailable() => Err(e.into()),
            Err(e) => {
                warn!(region = %region_id, error = %e, "recognition failed");
                Ok(RegionOutcome {
                    region_id,
                    normalized: None,
                    names: Err(e.into()),
                })
            }
        }
    }
}

fn log_summary(run: &PipelineRun) {
    info!(
        regions = run.regions.len(),
        regions_extracted = run.regions_extracted(),
        names_recognized = run.names_recognized(),
        failed = run.failures().count(),
        "scan complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionError;
    use crate::types::RegionBox;
    use image::{GenericImageView, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Answers by crop width so each region gets its own text
    struct FakeRecognizer {
        calls: AtomicUsize,
    }

    impl FakeRecognizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(
            &self,
            image: &DynamicImage,
            _config: &RecognitionConfig,
        ) -> Result<String, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match image.width() {
                40 => Ok("Alice\n;Bob:\n\nCarl0\n".to_string()),
                30 => Ok("Zed\n".to_string()),
                20 => Err(RecognizeError::Failed("garbled".to_string())),
                _ => Ok(String::new()),
            }
        }
    }

    struct MissingEngine;

    impl TextRecognizer for MissingEngine {
        fn recognize(
            &self,
            _image: &DynamicImage,
            _config: &RecognitionConfig,
        ) -> Result<String, RecognizeError> {
            Err(RecognizeError::EngineUnavailable("not installed".to_string()))
        }
    }

    fn raw_config() -> AppConfig {
        AppConfig {
            preprocess: false,
            ..Default::default()
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(100, 100))
    }

    fn spec(id: &str, l: u32, r: u32) -> RegionSpec {
        RegionSpec::new(id, RegionBox::new(l, 0, r, 10).unwrap())
    }

    #[test]
    fn test_run_extracts_names_per_region() {
        let pipeline = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let regions = vec![spec("team", 0, 40), spec("enemy", 50, 80)];

        let run = pipeline.run(&frame(), &regions).unwrap();

        assert_eq!(
            run.names_for(Team::Own).unwrap(),
            &["Alice".to_string(), "Bob".to_string(), "CarlD".to_string()]
        );
        assert_eq!(run.names_for(Team::Opposing).unwrap(), &["Zed".to_string()]);
        assert_eq!(run.regions_extracted(), 2);
        assert_eq!(run.names_recognized(), 4);
    }

    #[test]
    fn test_out_of_bounds_region_does_not_stop_others() {
        let recognizer = FakeRecognizer::new();
        let pipeline = RosterPipeline::new(recognizer, &raw_config());
        let regions = vec![spec("team", 90, 130), spec("enemy", 50, 80)];

        let run = pipeline.run(&frame(), &regions).unwrap();

        assert!(matches!(
            run.regions[0].names,
            Err(PipelineError::Region(RegionError::OutOfBounds { .. }))
        ));
        assert!(run.names_for(Team::Own).is_none());
        assert_eq!(run.names_for(Team::Opposing).unwrap().len(), 1);
        assert_eq!(pipeline.recognizer().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recognition_failure_is_per_region() {
        let pipeline = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let regions = vec![spec("team", 0, 20), spec("enemy", 50, 80)];

        let run = pipeline.run(&frame(), &regions).unwrap();

        let failures: Vec<&str> = run.failures().map(|(id, _)| id).collect();
        assert_eq!(failures, vec!["team"]);
        assert!(run.names_for(Team::Opposing).is_some());
    }

    #[test]
    fn test_missing_engine_aborts_run() {
        let pipeline = RosterPipeline::new(MissingEngine, &raw_config());
        let regions = vec![spec("team", 0, 40), spec("enemy", 50, 80)];

        let err = pipeline.run(&frame(), &regions).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_text_is_empty_roster() {
        let pipeline = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let run = pipeline.run(&frame(), &[spec("team", 0, 10)]).unwrap();
        assert_eq!(run.names_for(Team::Own).unwrap().len(), 0);
    }

    #[test]
    fn test_preprocess_toggle_controls_normalization() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 10));

        let raw = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let (prepared, _) = raw.recognize_image(&image).unwrap();
        assert_eq!(prepared.dimensions(), (40, 10));

        // default normalization upscales 2x, which changes what the fake sees
        let normalized = RosterPipeline::new(FakeRecognizer::new(), &AppConfig::default());
        let (prepared, names) = normalized.recognize_image(&image).unwrap();
        assert_eq!(prepared.dimensions(), (80, 20));
        assert!(names.is_empty());
    }

    #[test]
    fn test_whole_image_mode() {
        let pipeline = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let image = DynamicImage::ImageRgb8(RgbImage::new(30, 5));

        let run = pipeline.run_whole(&image, Team::Opposing).unwrap();

        assert_eq!(run.names_for(Team::Opposing).unwrap(), &["Zed".to_string()]);
        assert!(run.names_for(Team::Own).is_none());
    }

    #[test]
    fn test_apply_and_write_outputs() {
        let dir = tempdir().unwrap();
        let pipeline = RosterPipeline::new(FakeRecognizer::new(), &raw_config());
        let regions = vec![spec("team", 0, 40), spec("enemy", 0, 20)];
        let run = pipeline.run(&frame(), &regions).unwrap();

        let mut roster = Roster::default();
        run.apply_to(&mut roster);
        let written = run.write_outputs(dir.path());
        let crops = run.save_crops(dir.path());

        assert_eq!(roster.team(Team::Own).len(), 3);
        assert!(roster.team(Team::Opposing).is_empty());
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, Team::Own);
        assert!(dir.path().join("team.txt").exists());
        assert!(!dir.path().join("enemy.txt").exists());
        assert_eq!(crops.len(), 1);
        assert!(dir.path().join("team.png").exists());
    }
}
