use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::SampleFormat;
use crate::error::OutputError;
use crate::models::{Document, Sample};

pub fn dataset_path(output_dir: &Path, genre: &str) -> PathBuf {
    output_dir.join(format!("{genre}_dataset.jsonl"))
}

pub fn structured_path(output_dir: &Path, genre: &str) -> PathBuf {
    output_dir.join(format!("{genre}_structured.json"))
}

pub async fn ensure_output_dir(output_dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| OutputError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })
}

/// Shape of one JSONL line.
pub fn format_sample(sample: &Sample, format: SampleFormat) -> serde_json::Value {
    match format {
        SampleFormat::Pair => json!({
            "prompt": sample.prompt,
            "response": sample.response,
        }),
        SampleFormat::Conversation => json!({
            "conversations": [
                { "role": "user", "content": format!("<s>{}</s>", sample.prompt) },
                { "role": "assistant", "content": format!("<s>{}</s>", sample.response) },
            ]
        }),
        SampleFormat::Text => json!({
            "text": format!("<s>{}</s> <s>{}</s>", sample.prompt, sample.response),
        }),
    }
}

/// Append-only JSONL writer for one genre. Owned by the single aggregator.
pub struct SampleWriter {
    path: PathBuf,
    out: BufWriter<File>,
    format: SampleFormat,
    written: usize,
}

impl SampleWriter {
    pub async fn create(
        output_dir: &Path,
        genre: &str,
        format: SampleFormat,
    ) -> Result<Self, OutputError> {
        let path = dataset_path(output_dir, genre);
        let file = File::create(&path)
            .await
            .map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            format,
            written: 0,
        })
    }

    pub async fn write_all(&mut self, samples: &[Sample]) -> Result<(), OutputError> {
        for sample in samples {
            let mut line = serde_json::to_string(&format_sample(sample, self.format)).map_err(
                |source| OutputError::Serialize {
                    path: self.path.clone(),
                    source,
                },
            )?;
            line.push('\n');
            self.out
                .write_all(line.as_bytes())
                .await
                .map_err(|source| OutputError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            self.written += 1;
        }
        Ok(())
    }

    /// Flush and return the number of samples written.
    pub async fn finish(mut self) -> Result<usize, OutputError> {
        self.out.flush().await.map_err(|source| OutputError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Wrote {} samples to {}", self.written, self.path.display());
        Ok(self.written)
    }
}

/// Pretty-printed array of every document of one genre.
pub async fn write_structured(
    output_dir: &Path,
    genre: &str,
    documents: &[Document],
) -> Result<PathBuf, OutputError> {
    let path = structured_path(output_dir, genre);
    let body = serde_json::to_string_pretty(documents).map_err(|source| OutputError::Serialize {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, body)
        .await
        .map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
