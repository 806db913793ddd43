//! Error types for the tactical decision layer.

use thiserror::Error;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the decision layer.
///
/// None of these are fatal to the host: the controller turns a mission error
/// into a `Fault` disband and keeps the tick going.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// A mission asked for a composition with no unit types in it.
    #[error("Mission '{0}' has an empty unit composition")]
    EmptyComposition(String),

    /// The catalog has no unit type suitable for the request.
    #[error("No unit type in catalog matches: {0}")]
    NoMatchingUnitType(String),

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration value '{field}': {message}")]
    InvalidConfig {
        /// Dotted path of the offending field.
        field: String,
        /// Error message.
        message: String,
    },

    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Failed to parse RON configuration.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
}
