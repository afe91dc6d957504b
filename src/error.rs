use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema resolution error: {0}")]
    SchemaResolution(String),

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Unknown backend '{name}' (known backends: {known})")]
    UnknownBackend { name: String, known: String },

    #[error("Table [{0}] already exists, use append or overwrite mode")]
    TableExists(String),

    #[error("Interrupted by user during {0}")]
    Interrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl ImportError {
    /// True when the error is a cooperative cancellation rather than a failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, ImportError::Interrupted(_))
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_is_distinguished() {
        assert!(ImportError::Interrupted("datatable".to_string()).is_interrupt());
        assert!(!ImportError::Backend("disk full".to_string()).is_interrupt());
    }

    #[test]
    fn test_unknown_backend_lists_known_names() {
        let err = ImportError::UnknownBackend {
            name: "mongo".to_string(),
            known: "memory, sqlite".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown backend 'mongo' (known backends: memory, sqlite)"
        );
    }
}
