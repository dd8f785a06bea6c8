//! Turning an arbitrarily chunked text stream into speakable sentences.

mod buffer;
pub mod cleaner;
mod decode;
pub mod joiner;
pub mod segmenter;

pub use buffer::{Pushed, TextBuffer};
pub use cleaner::clean;
pub use decode::Utf8ChunkDecoder;
pub use joiner::{join, merge, JoinDecision};
pub use segmenter::{segment, Segmented};
