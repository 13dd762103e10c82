use crate::error::ConvertError;
use std::path::Path;

/// Input document kinds the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    Epub,
}

impl InputFormat {
    /// Detect the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "epub" => Ok(Self::Epub),
            "" => Err(ConvertError::UnsupportedFormat("(no extension)".to_string())),
            other => Err(ConvertError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}
