use std::path::PathBuf;
use thiserror::Error;

/// Failures the converter reports to the user by kind.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input path does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input extension is neither `.pdf` nor `.epub`.
    #[error("Unsupported file format: {0}. Only .pdf and .epub are supported.")]
    UnsupportedFormat(String),

    /// The project file exists but does not have the expected shape.
    #[error("Invalid project file {}: {reason}", path.display())]
    InvalidProject { path: PathBuf, reason: String },

    /// YAML parse or serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
