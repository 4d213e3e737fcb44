use std::path::PathBuf;
use thiserror::Error;

use crate::services::templates::{Param, TemplateId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A template could not be filled from the parameters at hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("template `{template}` requires parameter `{param}`")]
    MissingParam { template: TemplateId, param: Param },
}

/// Failure of one input file. The file's output is discarded; the batch
/// carries on.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for {} failed: {reason}", .path.display())]
    Worker { path: PathBuf, reason: String },

    /// Nothing survived segmentation. Counted as a skip, not a failure.
    #[error("no chapters left in {} after segmentation", .path.display())]
    Empty { path: PathBuf },
}

impl FileError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::Read { path, .. }
            | FileError::Worker { path, .. }
            | FileError::Empty { path } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize output for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal run-level errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read input directory {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid marker rule: {0}")]
    Rules(#[from] regex::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}
