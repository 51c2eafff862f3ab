use crate::error::IngestError;
use crate::models::DEFAULT_OCR_DPI;
use crate::traits::PageRecognizer;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Rasterizes one page to PNG with poppler's `pdftoppm`, writing to stdout.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    pub program: String,
    pub dpi: u32,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self {
            program: "pdftoppm".to_string(),
            dpi: DEFAULT_OCR_DPI,
        }
    }
}

impl PageRenderer {
    pub fn render_png(&self, pdf_path: &Path, page_number: u32) -> Result<Vec<u8>, IngestError> {
        let page = page_number.to_string();
        let dpi = self.dpi.to_string();
        let output = Command::new(&self.program)
            .args(["-r", dpi.as_str(), "-f", page.as_str(), "-l", page.as_str()])
            .args(["-png", "-singlefile"])
            .arg(pdf_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| {
                IngestError::OcrFailed(format!("failed to run {}: {error}", self.program))
            })?;

        if !output.status.success() {
            return Err(IngestError::OcrFailed(format!(
                "{} exited with {} on page {page_number}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(IngestError::OcrFailed(format!(
                "{} produced no image for page {page_number}",
                self.program
            )));
        }

        Ok(output.stdout)
    }
}

/// Local recognition: `pdftoppm` raster piped into `tesseract stdin stdout`.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    pub renderer: PageRenderer,
    pub program: String,
    pub language: String,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            renderer: PageRenderer::default(),
            program: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

impl TesseractRecognizer {
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.renderer.dpi = dpi;
        self
    }
}

impl PageRecognizer for TesseractRecognizer {
    fn recognize(&self, pdf_path: &Path, page_number: u32) -> Result<String, IngestError> {
        let image = self.renderer.render_png(pdf_path, page_number)?;
        debug!(page = page_number, bytes = image.len(), "running tesseract");

        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                IngestError::OcrFailed(format!("failed to run {}: {error}", self.program))
            })?;

        // stdin is closed before waiting, whether or not the write went through.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&image),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        if let Err(error) = written {
            return Err(IngestError::OcrFailed(format!(
                "failed to feed page {page_number} to {}: {error}",
                self.program
            )));
        }
        if !output.status.success() {
            return Err(IngestError::OcrFailed(format!(
                "{} exited with {} on page {page_number}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    /// `None` when the endpoint is blank; a blank key means no auth.
    pub fn from_parts(endpoint: Option<&str>, api_key: Option<&str>) -> Option<Self> {
        let endpoint = endpoint.map(str::trim).filter(|value| !value.is_empty())?;
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Some(Self {
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    image_base64: String,
    mime_type: &'static str,
    page: u32,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Option<Vec<OcrPage>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Remote recognition: the rendered page is POSTed as base64 PNG to a
/// multimodal OCR service.
///
/// Uses a blocking client; call it from a blocking worker, not an async task.
pub struct EndpointRecognizer {
    config: OcrEndpointConfig,
    renderer: PageRenderer,
    client: Client,
}

impl EndpointRecognizer {
    pub fn new(config: OcrEndpointConfig, renderer: PageRenderer) -> Self {
        Self {
            config,
            renderer,
            client: Client::new(),
        }
    }
}

impl PageRecognizer for EndpointRecognizer {
    fn recognize(&self, pdf_path: &Path, page_number: u32) -> Result<String, IngestError> {
        let image = self.renderer.render_png(pdf_path, page_number)?;
        let payload = OcrRequest {
            image_base64: STANDARD.encode(image),
            mime_type: "image/png",
            page: page_number,
            source_path: pdf_path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "OCR request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        response_text(&payload, page_number)
    }
}

fn response_text(payload: &OcrResponse, page_number: u32) -> Result<String, IngestError> {
    if let Some(listed) = &payload.pages {
        let matched = listed
            .iter()
            .find(|page| page.page.unwrap_or(page_number) == page_number)
            .and_then(|page| page.text.clone());
        if let Some(text) = matched {
            return Ok(text);
        }
    }

    payload.text.clone().ok_or_else(|| {
        IngestError::OcrFailed(format!("OCR response had no text for page {page_number}"))
    })
}

/// Picks the endpoint recognizer when one is configured, tesseract otherwise.
pub fn select_recognizer(
    endpoint: Option<OcrEndpointConfig>,
    dpi: u32,
    language: &str,
) -> Box<dyn PageRecognizer> {
    match endpoint {
        Some(config) => {
            debug!(endpoint = %config.endpoint, "using OCR endpoint");
            let renderer = PageRenderer {
                dpi,
                ..PageRenderer::default()
            };
            Box::new(EndpointRecognizer::new(config, renderer))
        }
        None => Box::new(TesseractRecognizer {
            language: language.to_string(),
            ..TesseractRecognizer::default().with_dpi(dpi)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_page_text_is_preferred() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(1),
                    text: Some("wrong page".to_string()),
                },
                OcrPage {
                    page: Some(4),
                    text: Some("Load capacity".to_string()),
                },
            ]),
            text: Some("fallback".to_string()),
        };

        assert_eq!(response_text(&response, 4).unwrap(), "Load capacity");
    }

    #[test]
    fn plain_text_is_used_when_pages_do_not_match() {
        let response = OcrResponse {
            pages: Some(Vec::new()),
            text: Some("whole page".to_string()),
        };

        assert_eq!(response_text(&response, 2).unwrap(), "whole page");
    }

    #[test]
    fn response_without_text_is_an_error() {
        let response = OcrResponse {
            pages: None,
            text: None,
        };

        assert!(matches!(
            response_text(&response, 1),
            Err(IngestError::OcrFailed(_))
        ));
    }

    #[test]
    fn missing_renderer_binary_is_reported_as_ocr_failure() {
        let recognizer = TesseractRecognizer {
            renderer: PageRenderer {
                program: "pdftoppm-that-does-not-exist".to_string(),
                dpi: 300,
            },
            ..TesseractRecognizer::default()
        };

        let result = recognizer.recognize(Path::new("guide.pdf"), 1);
        assert!(matches!(result, Err(IngestError::OcrFailed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn recognizer_that_ignores_its_input_is_an_ocr_failure() -> Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let renderer = dir.path().join("render.sh");
        std::fs::write(&renderer, "#!/bin/sh\nhead -c 1048576 /dev/zero\n")?;
        std::fs::set_permissions(&renderer, std::fs::Permissions::from_mode(0o755))?;

        let recognizer = TesseractRecognizer {
            renderer: PageRenderer {
                program: renderer.display().to_string(),
                dpi: 300,
            },
            program: "true".to_string(),
            ..TesseractRecognizer::default()
        };

        let result = recognizer.recognize(Path::new("guide.pdf"), 1);
        assert!(matches!(result, Err(IngestError::OcrFailed(_))));
        Ok(())
    }

    #[test]
    fn blank_endpoint_means_local_recognition() {
        assert!(OcrEndpointConfig::from_parts(None, Some("key")).is_none());
        assert!(OcrEndpointConfig::from_parts(Some("  "), None).is_none());

        let config = OcrEndpointConfig::from_parts(Some(" http://ocr.local/page "), Some(" "))
            .expect("endpoint should be kept");
        assert_eq!(config.endpoint, "http://ocr.local/page");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn dpi_is_carried_to_renderer() {
        let recognizer = TesseractRecognizer::default().with_dpi(150);
        assert_eq!(recognizer.renderer.dpi, 150);
        assert_eq!(TesseractRecognizer::default().renderer.dpi, 300);
    }
}
