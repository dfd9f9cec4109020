// src/extractors/mod.rs
pub mod date;
pub mod markers;
pub mod records;
pub mod section;
pub mod tokens;

// Re-export key extraction types for convenience
pub use markers::{LineSequence, Marker, MarkerKind, MarkerMatcher, MarkerSet};
pub use records::{RecordBlockExtractor, TransactionField};
pub use section::{aggregate_summaries, SectionExtractor};
pub use tokens::{NegativeConvention, TokenPattern};
