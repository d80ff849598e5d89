use crate::config::SplitterConfig;
use crate::error::Result;
use crate::html::html_to_text;
use crate::types::TextChunk;
use std::iter;

/// Recursive, separator-cascading splitter
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    config: SplitterConfig,
}

impl RecursiveTextSplitter {
    /// Create a splitter, rejecting `chunk_overlap >= chunk_size`
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split one document into ordered, non-blank chunks
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<TextChunk> {
        if is_blank(text) {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_recursive(text, &mut pieces);

        log::debug!(
            "Split {} chars into {} chunks (size={}, overlap={})",
            char_len(text),
            pieces.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextChunk::new(text, index))
            .collect()
    }

    /// Split several documents; indices restart for every document
    #[must_use]
    pub fn split_documents<'a, I>(&self, documents: I) -> Vec<TextChunk>
    where
        I: IntoIterator<Item = &'a str>,
    {
        documents
            .into_iter()
            .flat_map(|doc| self.split_text(doc))
            .collect()
    }

    /// Strip markup, then split the remaining text
    #[must_use]
    pub fn split_html(&self, html: &str) -> Vec<TextChunk> {
        self.split_text(&html_to_text(html))
    }

    fn split_recursive(&self, text: &str, out: &mut Vec<String>) {
        let chunk_size = self.config.chunk_size;

        if char_len(text) <= chunk_size {
            if !is_blank(text) {
                out.push(text.to_string());
            }
            return;
        }

        let separator = self
            .config
            .separators
            .iter()
            .map(String::as_str)
            .find(|sep| text.contains(sep));

        let separator = match separator {
            Some(sep) if !sep.is_empty() => sep,
            _ => {
                self.hard_split(text, out);
                return;
            }
        };

        let separator_len = char_len(separator);
        let mut buffer = String::new();
        let mut buffer_len = 0usize;

        for part in text.split(separator) {
            let part_len = char_len(part);

            if !buffer.is_empty() && buffer_len + separator_len + part_len > chunk_size {
                // Same cascade again: an oversized single part falls through to the
                // next separator because it no longer contains this one.
                self.split_recursive(&buffer, out);
                buffer.clear();
                buffer.push_str(part);
                buffer_len = part_len;
            } else {
                if !buffer.is_empty() {
                    buffer.push_str(separator);
                    buffer_len += separator_len;
                }
                buffer.push_str(part);
                buffer_len += part_len;
            }
        }

        if !buffer.is_empty() {
            self.split_recursive(&buffer, out);
        }
    }

    /// Sliding character window; stops once a window reaches the end of the text
    fn hard_split(&self, text: &str, out: &mut Vec<String>) {
        let chunk_size = self.config.chunk_size;
        let step = chunk_size - self.config.chunk_overlap;

        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut start = 0;
        while start < total {
            let end = (start + chunk_size).min(total);
            let window = &text[bounds[start]..bounds[end]];
            if !is_blank(window) {
                out.push(window.to_string());
            }
            if end == total {
                break;
            }
            start += step;
        }
    }
}

/// One-shot split with an explicit configuration
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Result<Vec<TextChunk>> {
    let config = SplitterConfig::new(chunk_size, chunk_overlap).with_separators(separators.iter().copied());
    let splitter = RecursiveTextSplitter::new(config)?;
    Ok(splitter.split_text(text))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SEPARATORS;
    use crate::error::SplitterError;
    use pretty_assertions::assert_eq;

    fn splitter(size: usize, overlap: usize) -> RecursiveTextSplitter {
        RecursiveTextSplitter::new(SplitterConfig::new(size, overlap)).unwrap()
    }

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let err = RecursiveTextSplitter::new(SplitterConfig::new(10, 10)).unwrap_err();
        assert!(matches!(err, SplitterError::InvalidConfig(_)));
        assert!(split_text("abc", 5, 7, &DEFAULT_SEPARATORS).is_err());
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        let s = splitter(10, 2);
        assert!(s.split_text("").is_empty());
        assert!(s.split_text("   ").is_empty());
        assert!(s.split_text("\n\n\t").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = splitter(100, 10).split_text("Pluto is a dwarf planet.");
        assert_eq!(texts(&chunks), vec!["Pluto is a dwarf planet."]);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_paragraphs_are_reassembled_greedily() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        let chunks = splitter(10, 2).split_text(text);
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_oversized_part_falls_to_lower_separator() {
        let text = "short\n\none two three four five six";
        let chunks = splitter(12, 2).split_text(text);
        assert_eq!(
            texts(&chunks),
            vec!["short", "one two", "three four", "five six"]
        );
        assert!(chunks.iter().all(|c| c.char_len() <= 12));
    }

    #[test]
    fn test_hard_split_overlaps_exactly() {
        let chunks = splitter(4, 2).split_text("abcdefghij");
        assert_eq!(texts(&chunks), vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_hard_split_last_window_may_be_short() {
        let chunks = splitter(4, 1).split_text("abcdefghijk");
        assert_eq!(texts(&chunks), vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn test_hard_split_respects_char_boundaries() {
        let chunks = splitter(3, 1).split_text("ÄÖÜßéè");
        assert_eq!(texts(&chunks), vec!["ÄÖÜ", "Üßé", "éè"]);
    }

    #[test]
    fn test_no_separator_in_cascade_hard_splits() {
        let chunks = split_text("abcdefgh", 4, 0, &["\n"]).unwrap();
        assert_eq!(texts(&chunks), vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_empty_cascade_hard_splits() {
        let chunks = split_text("abcdefgh", 4, 0, &[]).unwrap();
        assert_eq!(texts(&chunks), vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_blank_windows_are_dropped() {
        let chunks = split_text("ab        cd", 4, 0, &[""]).unwrap();
        assert_eq!(texts(&chunks), vec!["ab  ", "  cd"]);
    }

    #[test]
    fn test_split_documents_restarts_indices() {
        let chunks = splitter(50, 5).split_documents(["first doc", "second doc"]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 0);
    }

    #[test]
    fn test_split_html_strips_markup() {
        let chunks = splitter(100, 10).split_html("<p>Saturn has <b>rings</b>.</p>");
        assert_eq!(texts(&chunks), vec!["Saturn has rings."]);
    }
}
