use crate::error::ExtractError;
use std::collections::HashMap;
use std::sync::Arc;

use super::PdfExtractor;

/// Turns the raw bytes of one file type into plain text
pub trait ContentExtractor: Send + Sync {
    /// Lower-case file extensions this extractor handles, without the dot
    fn extensions(&self) -> &[&'static str];

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Plain text and Markdown, decoded as UTF-8 with replacement of invalid sequences
#[derive(Debug, Default)]
pub struct TextExtractor;

impl ContentExtractor for TextExtractor {
    fn extensions(&self) -> &[&'static str] {
        &["txt", "md"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Extension-keyed lookup of extractors
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry; every lookup fails until extractors are registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the PDF and plain-text extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor::new());
        registry.register(TextExtractor);
        registry
    }

    /// Register an extractor under each of its extensions, replacing earlier entries
    pub fn register<E: ContentExtractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn ContentExtractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), extractor.clone());
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn ContentExtractor>> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .cloned()
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.get(extension).is_some()
    }

    /// Extract text with the extractor registered for `extension`
    pub fn extract(&self, extension: &str, bytes: &[u8]) -> Result<String, ExtractError> {
        let extractor = self
            .get(extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(extension.to_string()))?;
        extractor.extract(bytes)
    }
}
