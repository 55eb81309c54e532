// src/thickness/mod.rs - Per-column thickness histories with erosion and decompaction

pub mod builder;
pub mod diagnostics;
pub mod engine;
pub mod segment;
pub mod unconformity;

pub use diagnostics::{Diagnostic, ErrorBudget, LayerErrorCount};
pub use engine::{BuildReport, ColumnOutcome, ThicknessHistory, ThicknessHistoryEngine};
pub use segment::{ColumnHistory, LayerColumnHistory, SegmentHistory};
