use std::io;

use thiserror::Error;

/// Failure kinds for the fitting core. Every user-driven operation returns
/// one of these rather than printing and carrying on; the command loop
/// reports the message and leaves unrelated state untouched.
#[derive(Debug, Error)]
pub enum FitError {
    /// Malformed residue spec, zone spec or numeric parameter.
    #[error("invalid input: {0}")]
    Parse(String),

    /// A zone addresses a residue that does not exist in the structure.
    #[error("zone not found: {0}")]
    Reference(String),

    /// Equivalenced zones disagree in residue count, or an atom is
    /// missing on the mobile side while ignore-missing is off.
    #[error("structure mismatch: {0}")]
    Mismatch(String),

    /// Static capacity exceeded (structure count, selector count).
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// Fewer than three equivalenced coordinate pairs.
    #[error("degenerate fit: {0}")]
    Degenerate(String),

    /// A required structure has not been loaded or fitted yet.
    #[error("{0}")]
    State(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unable to read {path}: {message}")]
    PdbRead { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, FitError>;
