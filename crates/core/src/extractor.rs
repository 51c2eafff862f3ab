use crate::chunking::normalize_whitespace;
use crate::error::IngestError;
use crate::models::{ExtractedDocument, PageRecord, PageSource};
use crate::traits::PageRecognizer;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedDocument, IngestError>;
}

/// Reads the text layer with lopdf and hands empty pages to a recognizer.
pub struct LopdfExtractor<R> {
    recognizer: R,
}

impl<R: PageRecognizer> LopdfExtractor<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }
}

impl<R: PageRecognizer> PdfExtractor for LopdfExtractor<R> {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedDocument, IngestError> {
        std::fs::metadata(path)?;
        let document = Document::load(path)
            .map_err(|error| IngestError::PdfParse(format!("{}: {error}", path.display())))?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf has no pages: {}",
                path.display()
            )));
        }

        let text_layer = pages.into_keys().map(|page_no| {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()));
            (page_no, text)
        });

        Ok(assemble_pages(path, text_layer, &self.recognizer))
    }
}

/// Turns per-page text-layer results into page records, falling back to
/// recognition for every page whose text layer is empty or unreadable.
pub fn assemble_pages<I, R>(path: &Path, text_layer: I, recognizer: &R) -> ExtractedDocument
where
    I: IntoIterator<Item = (u32, Result<String, IngestError>)>,
    R: PageRecognizer + ?Sized,
{
    let mut extracted = ExtractedDocument::default();

    for (page_number, direct) in text_layer {
        extracted.total_pages += 1;

        let direct = match direct {
            Ok(text) => normalize_whitespace(&text),
            Err(error) => {
                debug!(page = page_number, %error, "text layer unreadable");
                String::new()
            }
        };

        if !direct.is_empty() {
            extracted.pages.push(PageRecord {
                page_number,
                text: direct,
                source: PageSource::TextLayer,
            });
            continue;
        }

        let recognized = match recognizer.recognize(path, page_number) {
            Ok(text) => normalize_whitespace(&text),
            Err(error) => {
                warn!(page = page_number, %error, "optical recognition failed, dropping page");
                String::new()
            }
        };

        if recognized.is_empty() {
            debug!(page = page_number, "page has no text, dropped");
            extracted.dropped_pages.push(page_number);
        } else {
            extracted.pages.push(PageRecord {
                page_number,
                text: recognized,
                source: PageSource::Recognized,
            });
        }
    }

    extracted
}
