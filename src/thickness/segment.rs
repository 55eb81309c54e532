use crate::time_function::PiecewiseTimeFunction;

/// Solid and real thickness of one segment through time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentHistory {
    pub solid: PiecewiseTimeFunction,
    pub real: PiecewiseTimeFunction,
}

impl SegmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the same point on the solid and the real function.
    pub fn add_point(&mut self, age: f64, thickness: f64) {
        self.solid.add_point(age, thickness);
        self.real.add_point(age, thickness);
    }

    pub fn is_empty(&self) -> bool {
        self.solid.is_empty()
    }
}

/// All segments of one layer at one column.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerColumnHistory {
    /// Segment 0 is the deepest.
    pub segments: Vec<SegmentHistory>,
    pub present_day_eroded_thickness: f64,
    pub succeeded: bool,
}

impl LayerColumnHistory {
    pub fn new(segment_count: usize) -> Self {
        Self {
            segments: vec![SegmentHistory::new(); segment_count],
            present_day_eroded_thickness: 0.0,
            succeeded: true,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Sum of the segment solid thicknesses at age 0, skipping empty segments.
    pub fn present_day_solid_thickness(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.solid.evaluate(0.0))
            .sum()
    }

    /// Stores the age-0 snapshot used for reporting.
    pub fn store_present_day_thickness(&mut self) {
        self.present_day_eroded_thickness = self.present_day_solid_thickness();
    }

    /// Adds the same point to every segment.
    pub fn add_point_to_all(&mut self, age: f64, segment_thickness: f64) {
        for segment in &mut self.segments {
            segment.add_point(age, segment_thickness);
        }
    }
}

/// The histories of every layer at one `(i, j)` column, in stack order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHistory {
    pub i: usize,
    pub j: usize,
    pub layers: Vec<LayerColumnHistory>,
}

impl ColumnHistory {
    pub fn succeeded(&self) -> bool {
        self.layers.iter().all(|l| l.succeeded)
    }
}
