//! Loading of declaration documents from disk.
//!
//! The format is chosen from the file extension; the same serde type can be
//! written as YAML, TOML or JSON.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::result::Result;

/// Supported document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    /// Detect the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` when the extension is missing or unknown.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::unsupported_format(path)),
        }
    }
}

/// Parse document text in the given format.
///
/// `origin` is only used to label errors.
///
/// # Errors
///
/// Returns the format-specific parse error.
pub fn parse_document<T: DeserializeOwned>(
    text: &str,
    format: DocumentFormat,
    origin: &Path,
) -> Result<T> {
    match format {
        DocumentFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| Error::yaml_parse_failed(origin, e.to_string()))
        }
        DocumentFormat::Toml => {
            toml::from_str(text).map_err(|e| Error::toml_parse_failed(origin, e.to_string()))
        }
        DocumentFormat::Json => {
            serde_json::from_str(text).map_err(|e| Error::json_parse_failed(e.to_string()))
        }
    }
}

/// Read and decode a document from disk.
///
/// # Errors
///
/// Returns an error if the extension is unsupported, the file cannot be read,
/// or its content does not decode into `T`.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    tracing::debug!(path = %path.display(), ?format, "Loaded document");
    parse_document(&text, format, path)
}
