pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod json_parser;
pub mod layer;
pub mod lithology;
pub mod math_utils;
pub mod segment_policy;
pub mod thickness;
pub mod time_function;

pub use config::EngineConfig;
pub use error::{CompactionError, ConfigError, GridError, ThicknessError, ValidationError};
pub use grid::{Grid, GridMap};
pub use layer::{Layer, LayerKind, LayerStack};
pub use thickness::{ThicknessHistory, ThicknessHistoryEngine};
pub use time_function::PiecewiseTimeFunction;
