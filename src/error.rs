//! Error taxonomy for the simulation core
//!
//! Two failure classes exist:
//! - `InvalidConfiguration` at construction time (bad parameters, nothing is built)
//! - `IndexOutOfRange` from particle accessors (a caller contract violation)
//!
//! Numerical edge cases (coincident particles, near-zero separations) are
//! absorbed by the softening term and the subdivision depth cap instead of
//! being surfaced as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("particle index {index} out of range for store of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
