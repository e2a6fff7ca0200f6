//! PaddleOCR driven through its command-line interface.

use super::backend::Recognizer;
use super::error::BackendError;
use super::subprocess;
use crate::types::Frame;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;

/// Environment variable pointing at the `paddleocr` executable.
pub const PADDLE_PATH_ENV: &str = "REQSCAN_PADDLEOCR_PATH";

static REC_TEXTS_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"]rec_texts['"]\s*:\s*\["#).expect("rec_texts regex pattern is valid and should compile")
});

/// Primary engine.
#[derive(Debug, Clone)]
pub struct PaddleEngine {
    program: PathBuf,
    lang: &'static str,
    version: String,
}

impl PaddleEngine {
    /// Locate `command` and make sure it runs.
    pub fn initialize(command: &str, languages: &[String]) -> Result<Self, BackendError> {
        let program = subprocess::locate_tool(command, PADDLE_PATH_ENV)?;
        let version = subprocess::probe_version(&program)?;
        let lang = paddle_language(languages);
        tracing::info!(program = %program.display(), %version, lang, "PaddleOCR initialized");
        Ok(Self { program, lang, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn arguments(&self, image_path: &str) -> Vec<String> {
        [
            "ocr",
            "-i",
            image_path,
            "--lang",
            self.lang,
            "--use_doc_orientation_classify",
            "False",
            "--use_doc_unwarping",
            "False",
            "--use_textline_orientation",
            "False",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Recognizer for PaddleEngine {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn recognize(&self, frame: &Frame) -> Result<Vec<String>, BackendError> {
        let png = frame
            .to_png_bytes()
            .map_err(|e| BackendError::InvalidInput(format!("PNG encoding failed: {}", e)))?;

        let mut input = tempfile::Builder::new()
            .prefix("reqscan-paddle-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| BackendError::InvalidInput(format!("temp file: {}", e)))?;
        input
            .write_all(&png)
            .and_then(|_| input.flush())
            .map_err(|e| BackendError::InvalidInput(format!("temp file: {}", e)))?;

        let image_path = input.path().to_string_lossy().into_owned();
        let stdout = subprocess::run(&self.program, &self.arguments(&image_path), None)?;
        parse_rec_texts(&stdout)
    }
}

/// The CLI has a single Chinese model that also reads Latin script.
fn paddle_language(languages: &[String]) -> &'static str {
    if languages.iter().any(|lang| lang.starts_with("ch")) {
        "ch"
    } else {
        "en"
    }
}

/// Collect every `rec_texts` list from PaddleOCR's printed result dicts, in order.
pub(crate) fn parse_rec_texts(output: &str) -> Result<Vec<String>, BackendError> {
    let mut found = false;
    let mut lines = Vec::new();
    for m in REC_TEXTS_KEY.find_iter(output) {
        found = true;
        lines.extend(parse_string_list(&output[m.end()..])?);
    }

    if !found {
        return Err(BackendError::MalformedOutput(
            "no rec_texts entry in PaddleOCR output".to_string(),
        ));
    }
    Ok(lines)
}

/// Parse Python string literals up to the closing `]`.
fn parse_string_list(input: &str) -> Result<Vec<String>, BackendError> {
    let mut items = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        match chars.next() {
            Some(']') => return Ok(items),
            Some(quote @ ('\'' | '"')) => items.push(parse_string_literal(&mut chars, quote)?),
            Some(other) => {
                return Err(BackendError::MalformedOutput(format!(
                    "unexpected '{}' in rec_texts list",
                    other
                )));
            }
            None => return Err(BackendError::MalformedOutput("unterminated rec_texts list".to_string())),
        }
    }
}

fn parse_string_literal(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Result<String, BackendError> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == quote {
            return Ok(value);
        }
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('x') => value.push(parse_hex_escape(chars, 2)?),
            Some('u') => value.push(parse_hex_escape(chars, 4)?),
            Some('U') => value.push(parse_hex_escape(chars, 8)?),
            Some(other) => value.push(other),
            None => break,
        }
    }
    Err(BackendError::MalformedOutput("unterminated string literal".to_string()))
}

fn parse_hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
) -> Result<char, BackendError> {
    let hex: String = chars.take(digits).collect();
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| BackendError::MalformedOutput(format!("bad escape \\{}", hex)))
}
