// src/time_function.rs - Piecewise-linear functions of geological age

use crate::constants::{THICKNESS_TOLERANCE, thickness_tolerance};
use crate::math_utils::interpolate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    /// Age in Ma; larger is older.
    pub age: f64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(age: f64, value: f64) -> Self {
        Self { age, value }
    }
}

/// A scalar history sampled at geological ages.
///
/// Points are kept oldest first. Two points may share an age, which records an
/// instantaneous jump: the earlier one holds the value just before the event
/// and the later one the value just after it.
///
/// Queries between two points interpolate linearly. Outside the recorded range
/// the function is constant and equal to the nearest endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseTimeFunction {
    points: Vec<TimePoint>,
}

impl PiecewiseTimeFunction {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Builds a function from `(age, value)` pairs, inserting them in order.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut function = Self::new();
        for &(age, value) in points {
            function.add_point(age, value);
        }
        function
    }

    /// Inserts a point, keeping ages in descending order.
    ///
    /// A point equal in age and value to one already stored is dropped and
    /// `false` is returned. A new value at an existing age is placed after
    /// the points already recorded for that age.
    pub fn add_point(&mut self, age: f64, value: f64) -> bool {
        if self.contains(age, value) {
            return false;
        }

        // first position whose age is strictly younger
        let position = self.points.partition_point(|p| p.age >= age);
        self.points.insert(position, TimePoint::new(age, value));
        true
    }

    /// Like `add_point`, but a new value at an existing age goes before the
    /// points already recorded for that age.
    pub(crate) fn add_point_oldest_side(&mut self, age: f64, value: f64) -> bool {
        if self.contains(age, value) {
            return false;
        }

        // first position whose age is at or younger
        let position = self.points.partition_point(|p| p.age > age);
        self.points.insert(position, TimePoint::new(age, value));
        true
    }

    fn contains(&self, age: f64, value: f64) -> bool {
        self.points
            .iter()
            .any(|p| p.age == age && (p.value - value).abs() <= thickness_tolerance(THICKNESS_TOLERANCE, value))
    }

    /// Value at `age`.
    ///
    /// At an age shared by several points the youngest-side value is returned.
    ///
    /// # Panics
    /// Panics when the function has no points.
    pub fn evaluate(&self, age: f64) -> f64 {
        let (oldest, youngest) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => panic!("cannot evaluate an empty time function"),
        };

        if age > oldest.age {
            return oldest.value;
        }
        if age <= youngest.age {
            return youngest.value;
        }

        // last point at or older than the query age
        let k = self.points.partition_point(|p| p.age >= age) - 1;
        let before = self.points[k];
        if before.age == age {
            return before.value;
        }
        let after = self.points[k + 1];
        interpolate(before.age, before.value, after.age, after.value, age)
    }

    /// Smallest value and the age at which it first occurs (oldest first).
    pub fn min_y(&self) -> (f64, f64) {
        self.extreme_y(|candidate, current| candidate < current)
    }

    /// Largest value and the age at which it first occurs (oldest first).
    pub fn max_y(&self) -> (f64, f64) {
        self.extreme_y(|candidate, current| candidate > current)
    }

    fn extreme_y(&self, better: impl Fn(f64, f64) -> bool) -> (f64, f64) {
        let first = match self.points.first() {
            Some(p) => *p,
            None => panic!("cannot take the extreme of an empty time function"),
        };
        let best = self.points[1..].iter().fold(first, |best, p| {
            if better(p.value, best.value) { *p } else { best }
        });
        (best.value, best.age)
    }

    pub fn raise_by(&mut self, delta: f64) {
        for p in &mut self.points {
            p.value += delta;
        }
    }

    pub fn scale_by(&mut self, factor: f64) {
        for p in &mut self.points {
            p.value *= factor;
        }
    }

    /// Exchanges the stored points with `other` without copying them.
    pub fn swap(&mut self, other: &mut PiecewiseTimeFunction) {
        std::mem::swap(&mut self.points, &mut other.points);
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn oldest(&self) -> Option<&TimePoint> {
        self.points.first()
    }

    pub fn youngest(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// Moves the deposition ramp (the two oldest points) to a new age window.
    ///
    /// Both new ages must stay at or older than every later point.
    pub(crate) fn retime_deposition(&mut self, start_age: f64, end_age: f64) {
        assert!(self.points.len() >= 2, "deposition ramp needs two points");
        debug_assert!(start_age >= end_age);
        debug_assert!(self.points.get(2).is_none_or(|p| p.age <= end_age));
        self.points[0].age = start_age;
        self.points[1].age = end_age;
    }
}
