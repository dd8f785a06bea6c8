use super::joiner::{self, JoinDecision};
use super::segmenter;

/// Pending text of one stream, waiting for terminal punctuation.
///
/// After every [`TextBuffer::push`] the buffer holds at most one unterminated
/// fragment; complete sentences are handed back to the caller.
#[derive(Debug, Default, Clone)]
pub struct TextBuffer {
    text: String,
}

/// Outcome of merging one cleaned chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pushed {
    pub decision: JoinDecision,
    /// Completed sentences, trimmed, in order. Never contains empty strings.
    pub sentences: Vec<String>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Merge a cleaned chunk and split off every completed sentence.
    pub fn push(&mut self, chunk: &str) -> Pushed {
        let decision = joiner::merge(&mut self.text, chunk);
        let segmented = segmenter::segment(&self.text);
        let sentences = segmented
            .sentences
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let remainder = segmented.remainder.to_string();
        self.text = remainder;
        Pushed {
            decision,
            sentences,
        }
    }

    /// Drain whatever never reached terminal punctuation.
    pub fn take_fragment(&mut self) -> Option<String> {
        let fragment = std::mem::take(&mut self.text);
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_word_is_rejoined_across_pushes() {
        let mut buffer = TextBuffer::new();
        let first = buffer.push("The cat sat on the ma");
        assert!(first.sentences.is_empty());
        assert_eq!(buffer.as_str(), "The cat sat on the ma");

        let second = buffer.push("t. It slept.");
        assert_eq!(second.decision, JoinDecision::Continuation);
        assert_eq!(second.sentences, vec!["The cat sat on the mat.", "It slept."]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_remainder_is_retained() {
        let mut buffer = TextBuffer::new();
        let pushed = buffer.push("First one. Second");
        assert_eq!(pushed.sentences, vec!["First one."]);
        assert_eq!(buffer.as_str(), "Second");

        let pushed = buffer.push("Part two.");
        assert_eq!(pushed.decision, JoinDecision::NewUnit);
        assert_eq!(pushed.sentences, vec!["Second Part two."]);
    }

    #[test]
    fn test_take_fragment() {
        let mut buffer = TextBuffer::new();
        buffer.push("The dog ra");
        assert_eq!(buffer.take_fragment().as_deref(), Some("The dog ra"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.take_fragment(), None);
    }
}
