use thiserror::Error;

/// Errors surfaced by the vocabulary tree engine.
///
/// Per-image failures during training (a missing descriptor file, an empty
/// matrix) are not represented here. They are skipped silently and simply
/// shrink the effective training set, matching the propagation policy of
/// the engine this crate implements.
#[derive(Error, Debug)]
pub enum VocabTreeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt vocabulary tree stream: {0}")]
    Corrupt(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, VocabTreeError>;
