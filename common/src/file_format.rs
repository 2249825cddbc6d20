use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FileExtensionError {
    #[error("Failed to get file extension")]
    MissingFileExtension,
    #[error("Unsupported file extension for file: {0}")]
    UnsupportedFileExtension(String),
}

pub type FileFormatResult<T> = Result<T, FileExtensionError>;

pub fn get_file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|os_str| os_str.to_str())
}

/// Text formats accepted for configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> FileFormatResult<Self> {
        let ext = get_file_extension(path).ok_or(FileExtensionError::MissingFileExtension)?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(FileExtensionError::UnsupportedFileExtension(
                path.display().to_string(),
            ))
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_extensions_are_case_insensitive() {
        assert_eq!(
            FileFormat::from_path(Path::new("config.yaml")).unwrap(),
            FileFormat::Yaml
        );
        assert_eq!(
            FileFormat::from_path(Path::new("config.YML")).unwrap(),
            FileFormat::Yaml
        );
    }

    #[test]
    fn json_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("dir/segment.json")).unwrap(),
            FileFormat::Json
        );
    }

    #[test]
    fn missing_extension_is_rejected() {
        assert!(matches!(
            FileFormat::from_path(Path::new("config")),
            Err(FileExtensionError::MissingFileExtension)
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            FileFormat::from_path(Path::new("config.toml")),
            Err(FileExtensionError::UnsupportedFileExtension(_))
        ));
    }
}
