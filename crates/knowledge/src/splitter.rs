//! Character-window splitting of loaded documents.

use crate::types::Document;
use docqa_core::{AppError, AppResult};

/// Splits text into overlapping windows of at most `chunk_size` bytes.
///
/// Window edges are moved to the nearest UTF-8 character boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidInput(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split one string into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let mut end = floor_char_boundary(text, (start + self.chunk_size).min(text.len()));
            if end <= start {
                // A single character wider than the window
                end = ceil_char_boundary(text, start + 1);
            }

            let piece = text[start..end].trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }

            if end >= text.len() {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap).max(start + 1);
            start = ceil_char_boundary(text, next);
        }

        pieces
    }

    /// Split each document; windows inherit the parent metadata plus a chunk index.
    pub fn split_documents(&self, documents: Vec<Document>) -> Vec<Document> {
        let input = documents.len();
        let mut output = Vec::with_capacity(input);

        for document in documents {
            let (content, metadata) = document.into_parts();
            for (index, piece) in self.split_text(&content).into_iter().enumerate() {
                output.push(Document::new(
                    piece,
                    metadata.clone().with_chunk(index as u32),
                ));
            }
        }

        tracing::debug!(
            input,
            output = output.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "Split documents"
        );

        output
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    #[test]
    fn test_invalid_settings() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn test_split_no_overlap() {
        let splitter = TextSplitter::new(100, 0).unwrap();
        let pieces = splitter.split_text(&"a".repeat(300));
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.len() == 100));
    }

    #[test]
    fn test_split_with_overlap() {
        let splitter = TextSplitter::new(100, 20).unwrap();
        let text: String = (0..300).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let pieces = splitter.split_text(&text);

        // windows start at 0, 80, 160, 240
        assert_eq!(pieces.len(), 4);
        assert_eq!(&pieces[0][80..], &pieces[1][..20]);
        assert_eq!(pieces[3].len(), 60);
    }

    #[test]
    fn test_split_short_text_single_piece() {
        let splitter = TextSplitter::new(1000, 100).unwrap();
        assert_eq!(splitter.split_text("The sky is blue."), vec!["The sky is blue."]);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn test_split_respects_utf8_boundaries() {
        let splitter = TextSplitter::new(5, 1).unwrap();
        let text = "Gamedex é um aplicativo 🎮 brasileiro";
        let pieces = splitter.split_text(text);

        assert!(!pieces.is_empty());
        assert!(pieces.iter().any(|p| p.contains('é')));
        assert!(pieces.iter().any(|p| p.contains('🎮')));
    }

    #[test]
    fn test_split_documents_inherits_metadata() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let doc = Document::new(
            "0123456789abcdefghij",
            DocumentMetadata::new("book.pdf").with_page(4),
        );

        let pieces = splitter.split_documents(vec![doc]);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].page_content(), "abcdefghij");
        assert_eq!(pieces[1].metadata().source, "book.pdf");
        assert_eq!(pieces[1].metadata().page, Some(4));
        assert_eq!(pieces[1].metadata().chunk, Some(1));
    }
}
