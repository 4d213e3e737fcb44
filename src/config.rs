use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Which synthesis strategies run and which templates they draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSet {
    /// Full chapter, continuation split and detail distillation.
    #[default]
    Dialog,
    /// Outline batches and paragraph continuation.
    Outline,
    /// Outline batches and length-targeted full chapters.
    Chapter,
    /// Every strategy.
    All,
}

/// Final chapter ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChapterOrder {
    /// Numeric when numbers never decrease, document order (with a warning)
    /// otherwise.
    #[default]
    Auto,
    Document,
    Numeric,
}

/// Shape of one line in the samples output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// `{"prompt": .., "response": ..}`
    #[default]
    Pair,
    /// `{"conversations": [{"role": "user", ..}, {"role": "assistant", ..}]}`
    Conversation,
    /// `{"text": "<s>prompt</s> <s>response</s>"}`
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum normalized characters for a chapter to be kept
    pub min_chapter_length: usize,

    /// Upper bound on prompt + response characters per sample
    pub max_sequence_length: usize,

    /// Chapters per outline-batch sample
    pub outline_chunk_size: usize,

    /// Probability that an eligible chapter gets a continuation sample
    pub continuation_ratio: f64,

    /// Character cap of extracted chapter summaries
    pub summary_length_cap: usize,

    /// Preceding paragraphs shown as context in paragraph continuation
    pub context_paragraph_window: usize,

    pub template_set: TemplateSet,

    /// Seed for strategy selection; unseeded runs draw from the OS
    pub random_seed: Option<u64>,

    pub chapter_order: ChapterOrder,

    /// Character cap of the theme string
    pub theme_length_cap: usize,

    /// Paragraphs used as theme when no synopsis header exists
    pub theme_fallback_paragraphs: usize,

    /// Chapters at or below this length never get a continuation sample
    pub continuation_min_length: usize,

    /// Characters kept on each side of a continuation split
    pub continuation_margin: usize,

    /// Tail of the prefix kept as continuation context
    pub continuation_context_length: usize,

    /// Probability of a detail-distillation sample per chapter
    pub detail_ratio: f64,

    /// Every k-th line forms the detail skeleton
    pub detail_line_stride: usize,

    /// Character cap of the detail skeleton
    pub skeleton_length: usize,

    /// Generated character names per prompt; 0 omits the list
    pub character_count: usize,

    /// Size of the file worker pool
    pub workers: usize,

    pub sample_format: SampleFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_chapter_length: 200,
            max_sequence_length: 3000,
            outline_chunk_size: 20,
            continuation_ratio: 0.35,
            summary_length_cap: 100,
            context_paragraph_window: 2,
            template_set: TemplateSet::Dialog,
            random_seed: None,
            chapter_order: ChapterOrder::Auto,
            theme_length_cap: 500,
            theme_fallback_paragraphs: 5,
            continuation_min_length: 1000,
            continuation_margin: 500,
            continuation_context_length: 500,
            detail_ratio: 0.2,
            detail_line_stride: 3,
            skeleton_length: 300,
            character_count: 3,
            workers: default_workers(),
            sample_format: SampleFormat::Pair,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl Config {
    /// Load a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_chapter_length", self.min_chapter_length),
            ("max_sequence_length", self.max_sequence_length),
            ("outline_chunk_size", self.outline_chunk_size),
            ("summary_length_cap", self.summary_length_cap),
            ("theme_length_cap", self.theme_length_cap),
            ("detail_line_stride", self.detail_line_stride),
            ("skeleton_length", self.skeleton_length),
            ("continuation_margin", self.continuation_margin),
            ("continuation_context_length", self.continuation_context_length),
            ("workers", self.workers),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        for (field, value) in [
            ("continuation_ratio", self.continuation_ratio),
            ("detail_ratio", self.detail_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside 0..=1")));
            }
        }

        if self.continuation_min_length < 2 * self.continuation_margin {
            return Err(invalid(
                "continuation_min_length",
                format!(
                    "must be at least twice continuation_margin ({})",
                    self.continuation_margin
                ),
            ));
        }

        if self.max_sequence_length <= self.skeleton_length {
            return Err(invalid(
                "max_sequence_length",
                "must leave room for a response after the longest skeleton prompt",
            ));
        }

        Ok(())
    }
}
