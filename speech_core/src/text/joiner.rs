//! Reassembly of words split across upstream reads.

/// How a new chunk attaches to the pending buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// The chunk continues the last word; append without a separator.
    Continuation,
    /// The chunk starts a new unit; separate it with a space.
    NewUnit,
}

fn is_lower_alpha(ch: char) -> bool {
    ch.is_alphabetic() && ch.is_lowercase()
}

/// Decide how a chunk starting with `chunk_head` attaches to a buffer ending
/// in `buffer_tail`.
///
/// Only two adjacent lowercase letters count as a split word. Digits,
/// punctuation and capitals at the boundary always start a new unit.
pub fn join(buffer_tail: Option<char>, chunk_head: Option<char>) -> JoinDecision {
    match (buffer_tail, chunk_head) {
        (Some(tail), Some(head)) if is_lower_alpha(tail) && is_lower_alpha(head) => {
            JoinDecision::Continuation
        }
        _ => JoinDecision::NewUnit,
    }
}

/// Append `chunk` to `buffer` according to [`join`].
pub fn merge(buffer: &mut String, chunk: &str) -> JoinDecision {
    let decision = join(buffer.chars().next_back(), chunk.chars().next());
    if decision == JoinDecision::NewUnit
        && !buffer.is_empty()
        && !buffer.ends_with(char::is_whitespace)
    {
        buffer.push(' ');
    }
    buffer.push_str(chunk);
    decision
}
