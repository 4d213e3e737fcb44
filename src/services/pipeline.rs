use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::config::Config;
use crate::error::{FileError, RunError};
use crate::models::{Document, Sample};
use crate::services::chapterizer;
use crate::services::encoding;
use crate::services::markers::Ruleset;
use crate::services::synthesizer::Synthesizer;
use crate::services::walker::{self, GenreDir};
use crate::services::writer::{self, SampleWriter};

/// What a run produces per genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `<genre>_dataset.jsonl` of synthesized samples
    Samples,
    /// `<genre>_structured.json` of parsed documents
    Structure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub genre: String,
    pub path: PathBuf,
    pub cause: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenreReport {
    pub genre: String,
    pub files: usize,
    pub failed: usize,
    /// Files that parsed but kept no chapter.
    pub empty: usize,
    pub documents: usize,
    pub samples_written: usize,
    pub samples_skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub genres: Vec<GenreReport>,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn documents(&self) -> usize {
        self.genres.iter().map(|g| g.documents).sum()
    }

    pub fn samples_written(&self) -> usize {
        self.genres.iter().map(|g| g.samples_written).sum()
    }
}

struct FileOutcome {
    document: Document,
    samples: Vec<Sample>,
    skipped: usize,
}

/// Everything one worker needs. Shared state is read-only behind `Arc`.
struct FileTask {
    genre: String,
    path: PathBuf,
    seed: Option<u64>,
    mode: Mode,
    config: Arc<Config>,
    ruleset: Arc<Ruleset>,
    synthesizer: Arc<Synthesizer>,
}

impl FileTask {
    fn parse_and_synthesize(&self, bytes: &[u8]) -> Result<FileOutcome, FileError> {
        let (text, detected) = encoding::decode(bytes);
        tracing::debug!("Decoded {} as {}", self.path.display(), detected);

        let stem = walker::file_stem(&self.path);
        let document =
            chapterizer::build_document(&self.genre, &stem, &text, &self.ruleset, &self.config);
        if document.chapters.is_empty() {
            return Err(FileError::Empty {
                path: self.path.clone(),
            });
        }

        let (samples, skipped) = match self.mode {
            Mode::Structure => (Vec::new(), 0),
            Mode::Samples => {
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                let synthesis = self.synthesizer.synthesize(&document, &mut rng);
                (synthesis.samples, synthesis.skipped.len())
            }
        };

        Ok(FileOutcome {
            document,
            samples,
            skipped,
        })
    }
}

async fn process_file(task: FileTask) -> Result<FileOutcome, FileError> {
    let bytes = tokio::fs::read(&task.path)
        .await
        .map_err(|source| FileError::Read {
            path: task.path.clone(),
            source,
        })?;

    let path = task.path.clone();
    tokio::task::spawn_blocking(move || task.parse_and_synthesize(&bytes))
        .await
        .map_err(|err| FileError::Worker {
            path,
            reason: join_reason(err),
        })?
}

fn join_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

pub struct Pipeline {
    config: Arc<Config>,
    ruleset: Arc<Ruleset>,
    synthesizer: Arc<Synthesizer>,
    quiet: bool,
}

impl Pipeline {
    /// Validates the configuration and compiles the marker rules; both are
    /// fatal before any input is touched.
    pub fn new(config: Config) -> Result<Self, RunError> {
        config.validate()?;
        let ruleset = Ruleset::new()?;
        let synthesizer = Synthesizer::new(&config);
        Ok(Self {
            config: Arc::new(config),
            ruleset: Arc::new(ruleset),
            synthesizer: Arc::new(synthesizer),
            quiet: false,
        })
    }

    /// Hide progress bars.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn run(&self, input: &Path, output: &Path, mode: Mode) -> Result<RunReport, RunError> {
        let genres = walker::discover(input).map_err(|source| RunError::Input {
            path: input.to_path_buf(),
            source,
        })?;
        writer::ensure_output_dir(output).await?;

        tracing::info!(
            "Found {} genres under {}",
            genres.len(),
            input.display()
        );

        let mut report = RunReport::default();
        for (genre_idx, genre) in genres.iter().enumerate() {
            let summary = self
                .run_genre(genre_idx, genre, output, mode, &mut report.failures)
                .await?;
            tracing::info!(
                genre = %summary.genre,
                files = summary.files,
                failed = summary.failed,
                empty = summary.empty,
                documents = summary.documents,
                samples_written = summary.samples_written,
                samples_skipped = summary.samples_skipped,
                "genre done"
            );
            report.genres.push(summary);
        }

        Ok(report)
    }

    async fn run_genre(
        &self,
        genre_idx: usize,
        genre: &GenreDir,
        output: &Path,
        mode: Mode,
        failures: &mut Vec<FileFailure>,
    ) -> Result<GenreReport, RunError> {
        let mut summary = GenreReport {
            genre: genre.genre.clone(),
            files: genre.files.len(),
            ..GenreReport::default()
        };

        let mut sample_writer = match mode {
            Mode::Samples => {
                Some(SampleWriter::create(output, &genre.genre, self.config.sample_format).await?)
            }
            Mode::Structure => None,
        };

        let progress = self.progress_bar(&genre.genre, genre.files.len());
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        let mut task_paths = HashMap::new();

        for (file_idx, path) in genre.files.iter().enumerate() {
            let task = FileTask {
                genre: genre.genre.clone(),
                path: path.clone(),
                seed: self.file_seed(genre_idx, file_idx),
                mode,
                config: Arc::clone(&self.config),
                ruleset: Arc::clone(&self.ruleset),
                synthesizer: Arc::clone(&self.synthesizer),
            };
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => process_file(task).await,
                    Err(e) => Err(FileError::Worker {
                        path: task.path,
                        reason: e.to_string(),
                    }),
                };
                (file_idx, outcome)
            });
            task_paths.insert(handle.id(), path.clone());
        }

        let mut documents: Vec<(usize, Document)> = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, (file_idx, outcome))) => outcome.map(|o| (file_idx, o)),
                Err(err) => Err(FileError::Worker {
                    path: task_paths.remove(&err.id()).unwrap_or_default(),
                    reason: join_reason(err),
                }),
            };
            progress.inc(1);

            match outcome {
                Ok((file_idx, outcome)) => {
                    summary.documents += 1;
                    summary.samples_skipped += outcome.skipped;
                    if let Some(out) = sample_writer.as_mut() {
                        out.write_all(&outcome.samples).await?;
                    }
                    if mode == Mode::Structure {
                        documents.push((file_idx, outcome.document));
                    }
                }
                Err(FileError::Empty { path }) => {
                    tracing::info!("No chapters kept in {}, skipping", path.display());
                    summary.empty += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping '{}': {}", e.path().display(), e);
                    summary.failed += 1;
                    failures.push(FileFailure {
                        genre: genre.genre.clone(),
                        path: e.path().to_path_buf(),
                        cause: e.to_string(),
                    });
                }
            }
        }
        progress.finish_and_clear();

        if let Some(out) = sample_writer {
            summary.samples_written = out.finish().await?;
        }
        if mode == Mode::Structure {
            documents.sort_by_key(|(idx, _)| *idx);
            let documents: Vec<Document> = documents.into_iter().map(|(_, d)| d).collect();
            writer::write_structured(output, &genre.genre, &documents).await?;
        }

        Ok(summary)
    }

    /// Per-file seed so that a seeded run does not depend on scheduling.
    fn file_seed(&self, genre_idx: usize, file_idx: usize) -> Option<u64> {
        self.config
            .random_seed
            .map(|seed| seed.wrapping_add(((genre_idx as u64) << 32) | file_idx as u64))
    }

    fn progress_bar(&self, genre: &str, len: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(genre.to_string());
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn novel() -> String {
        let body = "他走过长街，风吹动衣角，远处传来钟声。\n".repeat(15);
        format!("《长街》\n作者：某人\n\n第一章 出门\n{body}\n第二章 归来\n{body}")
    }

    fn pipeline() -> Pipeline {
        let config = Config {
            random_seed: Some(1),
            workers: 2,
            ..Config::default()
        };
        Pipeline::new(config).unwrap().quiet(true)
    }

    #[tokio::test]
    async fn test_unreadable_file_does_not_stop_the_genre() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, novel()).unwrap();
        let genre = GenreDir {
            genre: "武侠".to_string(),
            files: vec![dir.path().join("missing.txt"), good],
        };

        let out = TempDir::new().unwrap();
        let mut failures = Vec::new();
        let summary = pipeline()
            .run_genre(0, &genre, out.path(), Mode::Samples, &mut failures)
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.documents, 1);
        assert!(summary.samples_written > 0);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].path.ends_with("missing.txt"));
    }

    #[tokio::test]
    async fn test_empty_document_is_a_skip_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let short = dir.path().join("short.txt");
        std::fs::write(&short, "太短了").unwrap();
        let genre = GenreDir {
            genre: "短篇".to_string(),
            files: vec![short],
        };

        let out = TempDir::new().unwrap();
        let mut failures = Vec::new();
        let summary = pipeline()
            .run_genre(0, &genre, out.path(), Mode::Structure, &mut failures)
            .await
            .unwrap();

        assert_eq!(summary.empty, 1);
        assert_eq!(summary.failed, 0);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_file_seeds_are_distinct_and_stable() {
        let p = pipeline();
        assert_eq!(p.file_seed(0, 1), p.file_seed(0, 1));
        assert_ne!(p.file_seed(0, 1), p.file_seed(1, 1));
        assert_ne!(p.file_seed(0, 0), p.file_seed(0, 1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            max_sequence_length: 0,
            ..Config::default()
        };
        assert!(matches!(Pipeline::new(config), Err(RunError::Config(_))));
    }
}
