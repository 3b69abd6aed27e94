//! Error types for map generation.

use thiserror::Error;

/// Problems found while validating a terrain template catalog at load time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Template '{template}' refers to unknown terrain type '{terrain}'")]
    UnknownTerrainType { template: String, terrain: String },

    #[error("Duplicate template name '{0}'")]
    DuplicateTemplate(String),

    #[error("Template '{0}' has an empty footprint")]
    EmptyFootprint(String),

    #[error("Template '{template}' declares {expected} tiles but footprint has {actual}")]
    FootprintMismatch {
        template: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid connector '{connector}' in template '{template}'")]
    InvalidConnector { template: String, connector: String },

    #[error("Segment {index} of template '{template}' is invalid: {reason}")]
    InvalidSegment {
        template: String,
        index: usize,
        reason: String,
    },

    #[error("Catalog has too many {what} (limit {limit})")]
    TooLarge { what: String, limit: usize },

    #[error("Catalog has no template named '{0}'")]
    MissingTemplate(String),

    #[error("Failed to parse catalog: {0}")]
    Parse(String),
}

/// The single generation-failure condition raised by the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Invalid value for parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Ambiguous symmetry policy: {0}")]
    AmbiguousSymmetry(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("No playable region found")]
    NoPlayableRegion,

    #[error("Could not fit tiles for {kind} path: {reason}")]
    PathTiling { kind: String, reason: String },

    #[error("No room to place spawn for player {player}")]
    NoRoomForSpawn { player: usize },

    #[error("Map splits into more than {limit} regions")]
    TooManyRegions { limit: usize },
}

impl GenerationError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        GenerationError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure while writing a generated map to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for all generation operations
pub type GenResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::invalid("water", "must be within 0..=1, got 1.5");
        assert_eq!(
            err.to_string(),
            "Invalid value for parameter 'water': must be within 0..=1, got 1.5"
        );

        let err: GenerationError = CatalogError::MissingTemplate("beach".into()).into();
        assert!(err.to_string().contains("no template named 'beach'"));
    }
}
