use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::{FileExtensionError, FileFormat};

#[derive(Debug, thiserror::Error)]
pub enum SerdeFormatError {
    #[error("YAML serialization failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Extension(#[from] FileExtensionError),
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type SerdeFormatResult<T> = Result<T, SerdeFormatError>;

/// Serializes `value` as text, always ending with a single newline.
pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> SerdeFormatResult<String> {
    let mut text = match format {
        FileFormat::Yaml => serde_yml::to_string(value)?,
        FileFormat::Json => serde_json::to_string_pretty(value)?,
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

pub fn deserialize<T: DeserializeOwned + 'static>(
    serialized: &str,
    format: FileFormat,
) -> SerdeFormatResult<T> {
    match format {
        FileFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
        FileFormat::Json => Ok(serde_json::from_str(serialized)?),
    }
}

/// Reads and deserializes a file, picking the format from its extension.
pub fn load_file<T: DeserializeOwned + 'static>(path: &Path) -> SerdeFormatResult<T> {
    let format = FileFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| SerdeFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Loading {} as {:?}", path.display(), format);
    deserialize(&text, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        radius: f64,
        name: String,
        sizes: Vec<u32>,
    }

    fn sample() -> Sample {
        Sample {
            radius: 2.5,
            name: "block".to_string(),
            sizes: vec![1, 15, 40],
        }
    }

    #[test]
    fn yaml_roundtrip() {
        let text = serialize(&sample(), FileFormat::Yaml).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: Sample = deserialize(&text, FileFormat::Yaml).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn json_roundtrip() {
        let text = serialize(&sample(), FileFormat::Json).unwrap();
        let parsed: Sample = deserialize(&text, FileFormat::Json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result: SerdeFormatResult<Sample> = deserialize("{ radius: ", FileFormat::Json);
        assert!(matches!(result, Err(SerdeFormatError::Json(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("definitely/not/here.yaml");
        let result: SerdeFormatResult<Sample> = load_file(path);
        match result {
            Err(SerdeFormatError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
