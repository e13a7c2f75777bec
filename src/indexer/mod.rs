//! Text extraction and token chunking
//!
//! Turns raw file bytes into text through an extension-keyed extractor registry, then
//! splits that text into overlapping token windows ready for the vector store.

mod chunker;
mod extractor;
mod pdf_extractor;

pub use chunker::{CharTokenizer, HfTokenizer, TokenChunker, Tokenize, window_ranges};
pub use extractor::{ContentExtractor, ExtractorRegistry, TextExtractor};
pub use pdf_extractor::PdfExtractor;
