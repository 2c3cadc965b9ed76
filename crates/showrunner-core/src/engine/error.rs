use thiserror::Error;

/// Why an import payload was refused. State is never touched on error.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("payload does not match the list export schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("unexpected payload format {found:?}, expected {expected:?}")]
    Format {
        found: String,
        expected: &'static str,
    },
}
