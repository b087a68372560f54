//! Tesseract CLI backend

use super::{OcrConfig, OcrEngine, PdfOcrEngine};
use crate::error::{Error, Result};
use crate::pdf::encode_png;
use image::DynamicImage;
use std::io::Write;
use std::process::{Command, Stdio};

/// Runs `tesseract stdin stdout` on a PNG-encoded image, producing plain
/// text or, with the `pdf` config, a one-page PDF with a text layer
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Check if tesseract is installed
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.page_segmentation_mode.to_string());
        cmd
    }

    /// Whole-page layout analysis; `dpi` sets the output page size
    fn pdf_command(&self, dpi: u32) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--dpi")
            .arg(dpi.to_string())
            .arg("pdf");
        cmd
    }

    /// Feed `input` to `cmd` and return its stdout
    fn run(&self, mut cmd: Command, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Ocr {
                reason: format!("Failed to run {}: {}", self.config.command, e),
            })?;

        // tesseract consumes all of stdin before writing any output.
        // stdin is closed at the end of this block.
        let sent = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input),
            None => Ok(()),
        };

        // Always reap the child, even when it stopped reading early
        let output = child.wait_with_output().map_err(|e| Error::Ocr {
            reason: format!("Failed to read tesseract output: {}", e),
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Err(e) = sent {
            return Err(Error::Ocr {
                reason: format!(
                    "Failed to send image to tesseract: {} ({})",
                    e,
                    stderr.trim()
                ),
            });
        }

        if !output.status.success() {
            return Err(Error::Ocr {
                reason: format!("Tesseract failed: {}", stderr.trim()),
            });
        }

        Ok(output.stdout)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let png = encode_png(image)?;
        let stdout = self.run(self.command(), &png)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl PdfOcrEngine for TesseractOcr {
    fn page_to_pdf(&self, image: &DynamicImage, dpi: u32) -> Result<Vec<u8>> {
        let png = encode_png(image)?;
        let pdf = self.run(self.pdf_command(dpi), &png)?;
        if !pdf.starts_with(b"%PDF") {
            return Err(Error::Ocr {
                reason: "Tesseract did not produce a PDF".to_string(),
            });
        }
        Ok(pdf)
    }
}
