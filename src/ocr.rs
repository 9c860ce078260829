use image::{GrayImage, ImageFormat};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::Command;

use crate::error::WatchError;
use crate::watcher::TextRecognizer;

/// Runs the Tesseract command-line engine on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: Option<String>,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|lang| !lang.trim().is_empty());
        self
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String, WatchError> {
        let fail = |msg: String| WatchError::RecognitionFailure(msg);

        let mut file = tempfile::Builder::new()
            .prefix("donewatch-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| fail(format!("temp file: {err}")))?;
        image
            .write_to(&mut file, ImageFormat::Png)
            .map_err(|err| fail(format!("png encode: {err}")))?;
        file.flush().map_err(|err| fail(format!("png flush: {err}")))?;

        let mut command = Command::new(&self.binary);
        command.arg(file.path()).arg("stdout");
        if let Some(language) = &self.language {
            command.args(["-l", language]);
        }

        let output = command.output().map_err(|err| match err.kind() {
            ErrorKind::NotFound => fail(format!(
                "{} not found; install Tesseract and put it on PATH",
                self.binary.display()
            )),
            _ => fail(format!("failed to run {}: {err}", self.binary.display())),
        })?;

        if !output.status.success() {
            return Err(fail(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
