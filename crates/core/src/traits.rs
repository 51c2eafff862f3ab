use crate::{IngestError, SearchError};
use async_trait::async_trait;
use std::path::Path;

/// Optical recognition of a single rendered page.
///
/// Called only for pages whose text layer is empty. Implementations block.
pub trait PageRecognizer {
    fn recognize(&self, pdf_path: &Path, page_number: u32) -> Result<String, IngestError>;
}

impl<R: PageRecognizer + ?Sized> PageRecognizer for &R {
    fn recognize(&self, pdf_path: &Path, page_number: u32) -> Result<String, IngestError> {
        (**self).recognize(pdf_path, page_number)
    }
}

impl<R: PageRecognizer + ?Sized> PageRecognizer for Box<R> {
    fn recognize(&self, pdf_path: &Path, page_number: u32) -> Result<String, IngestError> {
        (**self).recognize(pdf_path, page_number)
    }
}

/// Text-generation backend: system instruction and prompt in, text out.
#[async_trait]
pub trait Generator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, SearchError>;
}
