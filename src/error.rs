// src/error.rs - Error types for compaction, input validation and history building

use thiserror::Error;

/// Failure of a compaction law evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompactionError {
    #[error("non-finite compaction input (max VES {max_ves}, thickness {thickness})")]
    NonFiniteInput { max_ves: f64, thickness: f64 },

    #[error("negative density difference {0} kg/m³")]
    NegativeDensityDifference(f64),

    #[error("inverse compaction did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("compaction law produced a non-finite thickness")]
    NonFiniteResult,
}

/// Input problems that fail a single column without stopping the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("mobile layer cannot be eroded ({requested:.3} m requested by {eroding_layer})")]
    MobileLayerErosion { requested: f64, eroding_layer: String },

    #[error("igneous intrusion cannot be eroded ({requested:.3} m requested by {eroding_layer})")]
    IntrusionErosion { requested: f64, eroding_layer: String },

    #[error("erosion reached the basement with {remaining:.3} m left to remove ({eroding_layer})")]
    BasementErosion { remaining: f64, eroding_layer: String },

    #[error("erosion ran past the bottom of the stack with {remaining:.3} m left to remove ({eroding_layer})")]
    ErosionBeyondStack { remaining: f64, eroding_layer: String },

    #[error("negative mobile layer thickness {thickness:.4} m")]
    NegativeMobileThickness { thickness: f64 },

    #[error("negative igneous intrusion thickness {thickness:.4} m")]
    NegativeIntrusionThickness { thickness: f64 },
}

/// Failures that abort a whole thickness-history build.
#[derive(Debug, Error)]
pub enum ThicknessError {
    #[error("compaction failed for layer {layer} at column ({i}, {j})")]
    Compaction {
        layer: String,
        i: usize,
        j: usize,
        #[source]
        source: CompactionError,
    },

    #[error("malformed solid thickness history for layer {layer}, segment {segment} at column ({i}, {j})")]
    MalformedHistory {
        layer: String,
        i: usize,
        j: usize,
        segment: usize,
    },

    #[error("{open} unconformities left open at column ({i}, {j}) with {remaining:.4} m unresolved")]
    UnbalancedUnconformities {
        i: usize,
        j: usize,
        open: usize,
        remaining: f64,
    },

    #[error("layer index {0} out of range")]
    LayerIndexOutOfRange(usize),

    #[error("column ({i}, {j}) out of range")]
    ColumnOutOfRange { i: usize, j: usize },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid layer stack: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid map of {nx}x{ny} expects {expected} values, got {actual}")]
    DimensionMismatch {
        nx: usize,
        ny: usize,
        expected: usize,
        actual: usize,
    },

    #[error("map is {actual_nx}x{actual_ny} but the grid is {nx}x{ny}")]
    GridMismatch {
        nx: usize,
        ny: usize,
        actual_nx: usize,
        actual_ny: usize,
    },
}
