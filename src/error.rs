//! Error taxonomy for the engine.
//!
//! Failures are contained at the component boundary that produced them:
//! extraction and analysis degrade to defaults and never reach the
//! external caller; storage and chat failures are surfaced to the
//! immediate caller; comparison input errors are user-visible.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable content could be extracted. Degrades to an empty record.
    #[error("content extraction failed: {0}")]
    Extraction(String),

    /// The analysis provider errored. Callers fall back to the heuristic
    /// analyzer; this never escalates past the analysis seam.
    #[error("analysis provider failed: {0}")]
    Analysis(String),

    /// The persistence layer failed. Surfaced to the immediate caller,
    /// logged, never crashes the process.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),

    /// Fewer than two resolvable pages were supplied for comparison.
    #[error("need at least two captured pages to compare")]
    ComparisonInput,

    /// The chat turn could not be completed. Surfaced as a fixed apology;
    /// the failed assistant turn is not recorded.
    #[error("chat turn failed: {0}")]
    Chat(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
