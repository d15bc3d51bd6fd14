//! Error types for serialq.
//!
//! The queue itself introduces no runtime errors: submission cannot
//! fail, and an operation's failure surfaces only through its own
//! handle. What remains is construction-time rejection of bad tuning.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A gc limit of zero would leave the drain loop unable to make
    /// progress.
    #[error("gc limit must be at least 1, got {0}")]
    InvalidGcLimit(usize),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
