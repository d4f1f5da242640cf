use conkg_core::vector::TextChunk;

/// Character-window splitter with overlap, snapping window ends back to whitespace.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { size: 1000, overlap: 200 }
    }
}

impl Chunker {
    /// `overlap` is reduced below `size` when it would stall the window.
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size - 1),
        }
    }

    pub fn split(&self, document_id: &str, project_id: Option<&str>, text: &str) -> Vec<TextChunk> {
        // byte offset of every char, plus the end
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n_chars = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < n_chars {
            let mut end = (start + self.size).min(n_chars);
            if end < n_chars {
                let half = start + self.size / 2;
                if let Some(ws) = (half.max(start + 1)..end)
                    .rev()
                    .find(|&i| text[bounds[i]..].starts_with(char::is_whitespace))
                {
                    end = ws;
                }
            }

            let piece = &text[bounds[start]..bounds[end]];
            if !piece.trim().is_empty() {
                let ordinal = chunks.len();
                chunks.push(TextChunk {
                    id: TextChunk::chunk_id(document_id, ordinal),
                    document_id: document_id.to_string(),
                    project_id: project_id.map(str::to_string),
                    ordinal,
                    start: bounds[start],
                    end: bounds[end],
                    text: piece.to_string(),
                });
            }

            if end >= n_chars {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = Chunker::default().split("document:a", Some("project:p"), "Pour slab on Monday.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "document:a#0");
        assert_eq!(chunks[0].project_id.as_deref(), Some("project:p"));
        assert_eq!((chunks[0].start, chunks[0].end), (0, 20));
    }

    #[test]
    fn test_windows_overlap_and_snap_to_whitespace() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = Chunker::new(20, 5).split("d", None, text);
        assert!(chunks.len() > 2);
        for c in &chunks {
            assert_eq!(&text[c.start..c.end], c.text);
            assert!(c.text.chars().count() <= 20);
        }
        // every window but the last ends just before a space
        for c in &chunks[..chunks.len() - 1] {
            assert!(text[c.end..].starts_with(' '));
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end);
        }
        assert_eq!(chunks.last().map(|c| c.end), Some(text.len()));
    }

    #[test]
    fn test_unicode_offsets_are_char_boundaries() {
        let text = "Béton coulé à 25°C. ".repeat(20);
        let chunks = Chunker::new(30, 10).split("d", None, &text);
        for c in &chunks {
            assert!(text.is_char_boundary(c.start));
            assert!(text.is_char_boundary(c.end));
        }
    }

    #[test]
    fn test_blank_text_gives_no_chunks() {
        assert!(Chunker::default().split("d", None, "   \n  ").is_empty());
        assert!(Chunker::default().split("d", None, "").is_empty());
    }

    #[test]
    fn test_overlap_is_clamped() {
        let chunks = Chunker::new(4, 10).split("d", None, "abcdefghij");
        assert_eq!(chunks.first().map(|c| c.text.as_str()), Some("abcd"));
        assert_eq!(chunks.last().map(|c| c.end), Some(10));
    }
}
