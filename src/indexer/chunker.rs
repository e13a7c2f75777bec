use crate::error::ChunkingError;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// Converts text to token ids and back
pub trait Tokenize: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError>;

    fn decode(&self, ids: &[u32]) -> Result<String, ChunkingError>;
}

/// Hugging Face tokenizer, matching the vectorizer's token accounting
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Download (or reuse the local hub cache for) a tokenizer by identifier.
    ///
    /// Performs blocking network IO; call from `spawn_blocking` in async contexts.
    pub fn from_pretrained(identifier: &str) -> Result<Self, ChunkingError> {
        let inner = tokenizers::Tokenizer::from_pretrained(identifier, None)
            .map_err(|e| ChunkingError::TokenizerLoad(format!("{}: {}", identifier, e)))?;
        Ok(Self { inner })
    }

    /// Load a tokenizer.json from disk
    pub fn from_file(path: &Path) -> Result<Self, ChunkingError> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ChunkingError::TokenizerLoad(format!("{}: {}", path.display(), e)))?;
        Ok(Self { inner })
    }
}

impl Tokenize for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ChunkingError::Tokenize(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, ChunkingError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| ChunkingError::Tokenize(e.to_string()))
    }
}

/// One token per Unicode scalar value. Lossless, needs no vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenize for CharTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError> {
        Ok(text.chars().map(u32::from).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, ChunkingError> {
        ids.iter()
            .map(|&id| {
                char::from_u32(id)
                    .ok_or_else(|| ChunkingError::Tokenize(format!("invalid char token {}", id)))
            })
            .collect()
    }
}

/// Splits text into overlapping fixed-size token windows.
///
/// Window boundaries are token-aligned, so a chunk may start or end mid-sentence.
#[derive(Clone)]
pub struct TokenChunker {
    tokenizer: Arc<dyn Tokenize>,
    max_tokens: usize,
    overlap: usize,
}

impl TokenChunker {
    pub const DEFAULT_MAX_TOKENS: usize = 256;
    pub const DEFAULT_OVERLAP: usize = 50;

    pub fn new(
        tokenizer: Arc<dyn Tokenize>,
        max_tokens: usize,
        overlap: usize,
    ) -> Result<Self, ChunkingError> {
        validate_window(max_tokens, overlap)?;
        Ok(Self {
            tokenizer,
            max_tokens,
            overlap,
        })
    }

    /// Chunker with 256-token windows and 50 tokens of overlap
    pub fn with_defaults(tokenizer: Arc<dyn Tokenize>) -> Self {
        Self {
            tokenizer,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            overlap: Self::DEFAULT_OVERLAP,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk `text` into detokenized windows, in order
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        let tokens = self.tokenizer.encode(text)?;
        window_ranges(tokens.len(), self.max_tokens, self.overlap)?
            .into_iter()
            .map(|range| self.tokenizer.decode(&tokens[range]))
            .collect()
    }
}

fn validate_window(max_tokens: usize, overlap: usize) -> Result<(), ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidConfiguration(
            "max_tokens must be greater than 0".to_string(),
        ));
    }
    if overlap >= max_tokens {
        return Err(ChunkingError::InvalidConfiguration(format!(
            "overlap ({}) must be less than max_tokens ({})",
            overlap, max_tokens
        )));
    }
    Ok(())
}

/// Token index ranges of each window over a sequence of `len` tokens.
///
/// Windows start at 0 and advance by `max_tokens - overlap` while the start is inside the
/// sequence; the last window may be shorter than `max_tokens`.
pub fn window_ranges(
    len: usize,
    max_tokens: usize,
    overlap: usize,
) -> Result<Vec<Range<usize>>, ChunkingError> {
    validate_window(max_tokens, overlap)?;

    let step = max_tokens - overlap;
    let mut ranges = Vec::with_capacity(len.div_ceil(step));
    let mut start = 0;
    while start < len {
        ranges.push(start..(start + max_tokens).min(len));
        start += step;
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_chunker(max_tokens: usize, overlap: usize) -> TokenChunker {
        TokenChunker::new(Arc::new(CharTokenizer), max_tokens, overlap).unwrap()
    }

    /// Rebuild the token sequence by dropping each later window's overlapping prefix
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text = String::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            if idx == 0 {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().skip(overlap));
            }
        }
        text
    }

    #[test]
    fn test_window_ranges_basic() {
        let ranges = window_ranges(10, 4, 1).unwrap();
        assert_eq!(ranges, vec![0..4, 3..7, 6..10, 9..10]);
    }

    #[test]
    fn test_window_ranges_empty_input() {
        assert!(window_ranges(0, 256, 50).unwrap().is_empty());
    }

    #[test]
    fn test_window_ranges_shorter_than_window() {
        assert_eq!(window_ranges(100, 256, 50).unwrap(), vec![0..100]);
    }

    #[test]
    fn test_window_count_matches_step() {
        for len in 0..200 {
            for (max_tokens, overlap) in [(256, 50), (10, 3), (7, 0), (5, 4)] {
                let ranges = window_ranges(len, max_tokens, overlap).unwrap();
                assert_eq!(ranges.len(), len.div_ceil(max_tokens - overlap));
            }
        }
    }

    #[test]
    fn test_consecutive_windows_share_overlap() {
        let ranges = window_ranges(1000, 256, 50).unwrap();
        for pair in ranges.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.end < 1000 {
                assert_eq!(prev.end - next.start, 50);
            }
        }
    }

    #[test]
    fn test_overlap_equal_to_max_is_rejected() {
        let result = TokenChunker::new(Arc::new(CharTokenizer), 50, 50);
        assert!(matches!(
            result,
            Err(ChunkingError::InvalidConfiguration(_))
        ));
        assert!(window_ranges(10, 5, 7).is_err());
    }

    #[test]
    fn test_zero_max_tokens_is_rejected() {
        assert!(TokenChunker::new(Arc::new(CharTokenizer), 0, 0).is_err());
    }

    #[test]
    fn test_chunk_text_windows() {
        let chunker = char_chunker(4, 1);
        let chunks = chunker.chunk("abcdefghij").unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn test_chunk_reconstructs_original() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        for (max_tokens, overlap) in [(256, 50), (16, 5), (9, 0), (3, 2)] {
            let chunks = char_chunker(max_tokens, overlap).chunk(&text).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(char_chunker(256, 50).chunk("").unwrap().is_empty());
    }

    #[test]
    fn test_chunk_handles_multibyte_text() {
        let chunks = char_chunker(3, 1).chunk("héllo wörld").unwrap();
        assert_eq!(chunks[0], "hél");
        assert_eq!(reconstruct(&chunks, 1), "héllo wörld");
    }

    #[test]
    fn test_default_window() {
        let chunker = TokenChunker::with_defaults(Arc::new(CharTokenizer));
        assert_eq!(chunker.max_tokens(), 256);
        assert_eq!(chunker.overlap(), 50);
    }

    #[test]
    fn test_char_tokenizer_rejects_invalid_ids() {
        assert!(CharTokenizer.decode(&[0xD800]).is_err());
    }
}
