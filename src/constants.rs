pub const ACCELERATION_DUE_TO_GRAVITY: f64 = 9.81; // m/s²

// Thickness comparisons are made against THICKNESS_TOLERANCE * max(1, |reference|)
pub const THICKNESS_TOLERANCE: f64 = 1.0e-8;
// Per-segment values closer than this to the eroded amount snap to zero
pub const ERODED_SEGMENT_EPSILON: f64 = 1.0e-8;
pub const MOBILE_LAYER_NEGATIVE_THICKNESS_TOLERANCE: f64 = 1.0e-2; // m

pub const MAXIMUM_NUMBER_OF_ERRORS_PER_LAYER: usize = 5;

// Overpressure runs see only this fraction of the hydrostatic max VES
pub const OVERPRESSURE_VES_SCALE_FACTOR: f64 = 0.5;

pub const FRESH_WATER_DENSITY_KGM3: f64 = 1000.0;
pub const BRINE_DENSITY_KGM3: f64 = 1035.0;

// Element (brick) heights used to size segments, in metres
pub const DEFAULT_SEDIMENT_ELEMENT_HEIGHT_M: f64 = 100.0;
pub const DEFAULT_CRUST_ELEMENT_HEIGHT_M: f64 = 2000.0;
pub const DEFAULT_MANTLE_ELEMENT_HEIGHT_M: f64 = 10000.0;

// Inverse compaction solve
pub const DECOMPACTION_MAX_ITERATIONS: usize = 100;
pub const DECOMPACTION_RELATIVE_TOLERANCE: f64 = 1.0e-12;

/// Tolerance scaled to the magnitude of the value being compared.
pub fn thickness_tolerance(tolerance: f64, reference: f64) -> f64 {
    tolerance * reference.abs().max(1.0)
}
