pub mod chapterizer;
pub mod encoding;
pub mod markers;
pub mod names;
pub mod normalizer;
pub mod numeral;
pub mod pipeline;
pub mod summary;
pub mod synthesizer;
pub mod templates;
pub mod walker;
pub mod writer;
