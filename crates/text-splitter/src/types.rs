use serde::{Deserialize, Serialize};

/// A bounded piece of a source document, ready for embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk body
    pub text: String,

    /// Position in emission order (0-based, per document)
    pub index: usize,
}

impl TextChunk {
    #[must_use]
    pub const fn new(text: String, index: usize) -> Self {
        Self { text, index }
    }

    /// Length in characters (Unicode scalar values)
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
