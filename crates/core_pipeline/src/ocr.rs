//! OCR module
//!
//! Text recognition behind the [`TextRecognizer`] trait. The default
//! implementation drives the Tesseract command line tool; the `leptess`
//! feature adds an in-process binding.

use crate::config::RecognitionConfig;
use crate::error::RecognizeError;
use image::{DynamicImage, ImageFormat};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

/// Turns an image into raw, line-oriented text
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in `image`.
    ///
    /// An image with no text yields `Ok` with an empty (or whitespace)
    /// string. [`RecognizeError::EngineUnavailable`] is reserved for an
    /// engine that cannot be found or launched.
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<String, RecognizeError>;
}

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_INSTALL_PATHS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

/// Recognizer backed by the `tesseract` executable
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
}

impl TesseractCli {
    /// Use a specific executable without probing it
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Find the engine.
    ///
    /// `engine_path` may name the executable itself or the directory that
    /// holds it. Without one, `PATH` is probed first and then the usual
    /// Windows install locations.
    pub fn locate(engine_path: Option<&Path>) -> Result<Self, RecognizeError> {
        if let Some(path) = engine_path {
            if path.is_file() {
                return Ok(Self::with_executable(path));
            }
            let candidate = path.join(EXECUTABLE_NAME);
            if candidate.is_file() {
                return Ok(Self::with_executable(candidate));
            }
            return Err(RecognizeError::EngineUnavailable(format!(
                "no {} executable at {}",
                EXECUTABLE_NAME,
                path.display()
            )));
        }

        if let Ok(output) = Command::new(EXECUTABLE_NAME).arg("--version").output() {
            if output.status.success() {
                return Ok(Self::with_executable(EXECUTABLE_NAME));
            }
        }

        for path in COMMON_INSTALL_PATHS {
            let p = PathBuf::from(path);
            if p.exists() {
                return Ok(Self::with_executable(p));
            }
        }

        Err(RecognizeError::EngineUnavailable(
            "Tesseract not found. Install Tesseract-OCR or set engine_path".to_string(),
        ))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// First line of `tesseract --version`
    pub fn version(&self) -> Result<String, RecognizeError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|e| self.launch_error(e))?;

        // Older releases print the banner on stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(banner
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn launch_error(&self, e: io::Error) -> RecognizeError {
        if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) {
            RecognizeError::EngineUnavailable(format!(
                "cannot launch {}: {}",
                self.executable.display(),
                e
            ))
        } else {
            RecognizeError::Staging(e)
        }
    }
}

/// Engine options following the input and output arguments
fn engine_args(config: &RecognitionConfig) -> Vec<String> {
    let mut args = vec![
        "--oem".to_string(),
        config.ocr_engine.oem().to_string(),
        "--psm".to_string(),
        config.engine_mode.psm().to_string(),
        "-l".to_string(),
        config.language.clone(),
    ];
    if config.preserve_spacing {
        args.push("-c".to_string());
        args.push("preserve_interword_spaces=1".to_string());
    }
    args
}

impl TextRecognizer for TesseractCli {
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<String, RecognizeError> {
        let staged = NamedTempFile::with_suffix(".png")?;
        image.save_with_format(staged.path(), ImageFormat::Png)?;

        let args = engine_args(config);
        debug!(executable = %self.executable.display(), ?args, "running tesseract");

        let output = Command::new(&self.executable)
            .arg(staged.path())
            .arg("stdout")
            .args(&args)
            .output()
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognizeError::Failed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// In-process Tesseract through leptess
#[cfg(feature = "leptess")]
#[derive(Debug, Clone, Default)]
pub struct LeptessRecognizer {
    tessdata_dir: Option<String>,
}

#[cfg(feature = "leptess")]
impl LeptessRecognizer {
    pub fn new(tessdata_dir: Option<String>) -> Self {
        Self { tessdata_dir }
    }
}

#[cfg(feature = "leptess")]
impl TextRecognizer for LeptessRecognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<String, RecognizeError> {
        use leptess::{LepTess, Variable};

        let mut tesseract = LepTess::new(self.tessdata_dir.as_deref(), &config.language)
            .map_err(|e| RecognizeError::EngineUnavailable(e.to_string()))?;

        tesseract
            .set_variable(
                Variable::TesseditPagesegMode,
                &config.engine_mode.psm().to_string(),
            )
            .map_err(|e| RecognizeError::Failed(e.to_string()))?;
        if config.preserve_spacing {
            tesseract
                .set_variable(Variable::PreserveInterwordSpaces, "1")
                .map_err(|e| RecognizeError::Failed(e.to_string()))?;
        }

        // leptess wants an encoded image, not raw pixels
        let mut png_bytes = Vec::new();
        image.write_to(&mut io::Cursor::new(&mut png_bytes), ImageFormat::Png)?;

        tesseract
            .set_image_from_mem(&png_bytes)
            .map_err(|e| RecognizeError::Failed(e.to_string()))?;

        tesseract
            .get_utf8_text()
            .map_err(|e| RecognizeError::Failed(e.to_string()))
    }
}
