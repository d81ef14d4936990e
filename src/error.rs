use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("T-12 operating statement not found in the uploaded documents")]
    MissingT12,

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Model returned JSON with an unexpected shape: {0}")]
    MalformedSections(String),

    #[error("Unknown report tier: {0}")]
    InvalidTier(String),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("Illegal generation state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Stale write rejected: expected version {expected}, store has version {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
