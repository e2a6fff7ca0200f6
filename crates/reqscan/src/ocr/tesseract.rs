//! Tesseract driven through its command-line interface.

use super::backend::Recognizer;
use super::error::BackendError;
use super::subprocess;
use crate::types::Frame;
use std::path::PathBuf;

/// Environment variable pointing at the `tesseract` executable.
pub const TESSERACT_PATH_ENV: &str = "REQSCAN_TESSERACT_PATH";

/// Secondary engine. The frame is piped in as PNG and text read from stdout.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: PathBuf,
    languages: String,
    psm: u8,
    version: String,
}

impl TesseractEngine {
    pub fn initialize(command: &str, languages: &[String], psm: u8) -> Result<Self, BackendError> {
        let program = subprocess::locate_tool(command, TESSERACT_PATH_ENV)?;
        let version = subprocess::probe_version(&program)?;
        let languages = tesseract_languages(languages);
        tracing::info!(program = %program.display(), %version, %languages, psm, "Tesseract initialized");
        Ok(Self {
            program,
            languages,
            psm,
            version,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn arguments(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.languages.clone(),
            "--psm".to_string(),
            self.psm.to_string(),
        ]
    }
}

impl Recognizer for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, frame: &Frame) -> Result<Vec<String>, BackendError> {
        let png = frame
            .to_png_bytes()
            .map_err(|e| BackendError::InvalidInput(format!("PNG encoding failed: {}", e)))?;
        let stdout = subprocess::run(&self.program, &self.arguments(), Some(&png))?;
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

/// Map configured language codes to Tesseract traineddata names, joined with `+`.
pub(crate) fn tesseract_languages(languages: &[String]) -> String {
    languages
        .iter()
        .map(|lang| match lang.as_str() {
            "ch_sim" => "chi_sim",
            "ch_tra" => "chi_tra",
            "en" => "eng",
            other => other,
        })
        .collect::<Vec<_>>()
        .join("+")
}
