use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("Unsupported items file format: {0}")]
    UnsupportedFormat(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = SequencerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let err = SequencerError::UnsupportedFormat("yaml".into());
        assert_eq!(err.to_string(), "Unsupported items file format: yaml");
    }

    #[test]
    fn registry_error_converts() {
        let err: SequencerError = RegistryError::UnknownEngine("fancy".into()).into();
        assert!(matches!(err, SequencerError::Registry(_)));
        assert_eq!(
            err.to_string(),
            "Registry error: no engine registered under \"fancy\""
        );
    }
}
