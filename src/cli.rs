use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ChapterOrder, Config, SampleFormat, TemplateSet};
use crate::error::ConfigError;
use crate::services::pipeline::Mode;

/// Parse raw novels into chapters and synthesize fine-tuning samples.
#[derive(Debug, Parser)]
#[command(name = "novel-sft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write `<genre>_dataset.jsonl` prompt/response samples
    Synthesize(RunArgs),

    /// Write `<genre>_structured.json` parsed documents
    Structure(RunArgs),
}

impl Command {
    pub fn mode(&self) -> Mode {
        match self {
            Command::Synthesize(_) => Mode::Samples,
            Command::Structure(_) => Mode::Structure,
        }
    }

    pub fn args(&self) -> &RunArgs {
        match self {
            Command::Synthesize(args) | Command::Structure(args) => args,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Root directory with one subdirectory per genre
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory, created if missing
    #[arg(short, long)]
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that take precedence over the config file.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    #[arg(long)]
    pub min_chapter_length: Option<usize>,

    #[arg(long)]
    pub max_sequence_length: Option<usize>,

    #[arg(long)]
    pub outline_chunk_size: Option<usize>,

    #[arg(long)]
    pub continuation_ratio: Option<f64>,

    #[arg(long)]
    pub summary_length_cap: Option<usize>,

    #[arg(long)]
    pub context_paragraph_window: Option<usize>,

    #[arg(long, value_enum)]
    pub template_set: Option<TemplateSet>,

    #[arg(long)]
    pub random_seed: Option<u64>,

    #[arg(long, value_enum)]
    pub chapter_order: Option<ChapterOrder>,

    #[arg(long, value_enum)]
    pub sample_format: Option<SampleFormat>,

    #[arg(long)]
    pub character_count: Option<usize>,

    #[arg(short, long)]
    pub workers: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        set!(
            min_chapter_length,
            max_sequence_length,
            outline_chunk_size,
            continuation_ratio,
            summary_length_cap,
            context_paragraph_window,
            template_set,
            chapter_order,
            sample_format,
            character_count,
            workers,
        );
        if self.random_seed.is_some() {
            config.random_seed = self.random_seed;
        }
    }
}

impl RunArgs {
    /// Defaults, then the config file, then flags. Not yet validated.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.overrides.apply(&mut config);
        Ok(config)
    }
}
