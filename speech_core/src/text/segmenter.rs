//! Conservative sentence segmentation.
//!
//! A sentence is only reported once it is known to be terminated, so the
//! synthesizer never speaks a fragment that later turns out to continue.

/// Characters that may end a sentence.
pub const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Result of segmenting a buffer. All parts borrow from the input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segmented<'a> {
    /// Complete sentences, in order.
    pub sentences: Vec<&'a str>,
    /// Whitespace runs consumed between consecutive pieces.
    ///
    /// `separators[i]` follows `sentences[i]`; when a remainder is present the
    /// last separator precedes it.
    pub separators: Vec<&'a str>,
    /// Trailing text not yet terminated.
    pub remainder: &'a str,
}

impl Segmented<'_> {
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty() && self.remainder.is_empty()
    }
}

fn is_terminator(ch: char) -> bool {
    TERMINATORS.contains(&ch)
}

/// Whether `piece` ends in terminal punctuation, optionally followed by one `"`.
pub fn is_terminated(piece: &str) -> bool {
    let body = piece.strip_suffix('"').unwrap_or(piece);
    body.ends_with(TERMINATORS)
}

/// Split `buffer` at every whitespace run directly preceded by `.`, `!` or `?`.
///
/// Every piece except the last is a sentence. The last piece is a sentence
/// only if [`is_terminated`] holds for it, otherwise it is the remainder.
pub fn segment(buffer: &str) -> Segmented<'_> {
    if buffer.trim().is_empty() {
        return Segmented::default();
    }

    let mut sentences = Vec::new();
    let mut separators = Vec::new();
    let mut start = 0;
    let mut chars = buffer.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }
        let sep_start = idx + ch.len_utf8();
        let mut sep_end = sep_start;
        while let Some(&(next_idx, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            sep_end = next_idx + next.len_utf8();
            chars.next();
        }
        if sep_end > sep_start {
            sentences.push(&buffer[start..sep_start]);
            separators.push(&buffer[sep_start..sep_end]);
            start = sep_end;
        }
    }

    let last = &buffer[start..];
    let remainder = if is_terminated(last) {
        sentences.push(last);
        &buffer[buffer.len()..]
    } else {
        last
    };

    Segmented {
        sentences,
        separators,
        remainder,
    }
}
