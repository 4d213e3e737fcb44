use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

use crate::services::normalizer;

/// One parsed novel: metadata plus its chapters in final output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub genre: String,
    pub title: String,
    pub author: String,
    pub theme: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// 0 is reserved for preface / front matter.
    pub number: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    pub content: String,
    #[serde(skip)]
    paragraphs: OnceLock<Vec<String>>,
}

impl Chapter {
    pub fn new(number: u64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            volume: None,
            content: content.into(),
            paragraphs: OnceLock::new(),
        }
    }

    pub fn with_volume(mut self, volume: Option<String>) -> Self {
        self.volume = volume;
        self
    }

    /// Paragraphs of the content, split on blank lines on first access.
    pub fn paragraphs(&self) -> &[String] {
        self.paragraphs
            .get_or_init(|| normalizer::split_paragraphs(&self.content))
    }

    /// Content length in characters, the unit every threshold is expressed in.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_preface(&self) -> bool {
        self.number == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    Title,
    Author,
    Theme,
    Volume,
    Chapter,
}

/// A located structural cue. Lives only between matching and segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Byte span `[start, end)` in the text the marker was found in.
    pub span: Range<usize>,
    pub captures: Vec<String>,
}

impl Marker {
    pub fn capture(&self, idx: usize) -> &str {
        self.captures.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// One synthesized prompt/response training pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub prompt: String,
    pub response: String,
}

impl Sample {
    pub fn char_len(&self) -> usize {
        self.prompt.chars().count() + self.response.chars().count()
    }
}
