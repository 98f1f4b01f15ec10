use std::path::PathBuf;
use thiserror::Error;

/// Memory-manager error types
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Persistence error at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capability unavailable: {capability}")]
    CapabilityUnavailable { capability: String },

    #[error("Pool not found: {name}")]
    UnknownPool { name: String },

    #[error("Pool '{name}' does not hold values of type {requested}")]
    PoolTypeMismatch { name: String, requested: &'static str },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl MemoryError {
    pub fn config(message: impl Into<String>) -> Self {
        MemoryError::Configuration { message: message.into() }
    }

    /// Stable short code, used in logs and the HTTP surface
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::Configuration { .. } => "configuration",
            MemoryError::Capture { .. } => "capture",
            MemoryError::Persistence { .. } => "persistence",
            MemoryError::CapabilityUnavailable { .. } => "capability_unavailable",
            MemoryError::UnknownPool { .. } => "unknown_pool",
            MemoryError::PoolTypeMismatch { .. } => "pool_type_mismatch",
            MemoryError::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Serialization { message: e.to_string() }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::UnknownPool { name: "missing".to_string() };
        assert_eq!(err.to_string(), "Pool not found: missing");
        assert_eq!(err.code(), "unknown_pool");

        let err = MemoryError::Persistence {
            path: PathBuf::from("/tmp/report.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/report.json"));
    }
}
