use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("scanner not configured: `{key}` is missing or still a placeholder")]
    MissingCredential { key: &'static str },

    #[error("scanner backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("scanner already initialized; dispose it first")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("scanner is not initialized")]
    NotInitialized,

    #[error("camera power change failed: {0}")]
    Power(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scanner dispose failed: {0}")]
pub struct DisposeError(pub String);

/// Failure reported by a recognition engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine runtime failed to load: {0}")]
    Load(String),

    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("engine is not open")]
    NotOpen,
}
