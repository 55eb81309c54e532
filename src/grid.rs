// src/grid.rs - Horizontal grid, column validity and 2-D property maps

use crate::error::GridError;
use serde::{Deserialize, Serialize};

/// Decides whether a column takes part in a run.
pub trait ColumnValidity {
    fn is_valid_column(&self, i: usize, j: usize) -> bool;
}

/// A scalar value per column, stored row-major with `index = i * ny + j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    pub nx: usize,
    pub ny: usize,
    pub values: Vec<f64>,
}

impl GridMap {
    pub fn new(nx: usize, ny: usize, values: Vec<f64>) -> Result<Self, GridError> {
        if values.len() != nx * ny {
            return Err(GridError::DimensionMismatch {
                nx,
                ny,
                expected: nx * ny,
                actual: values.len(),
            });
        }
        Ok(Self { nx, ny, values })
    }

    pub fn constant(nx: usize, ny: usize, value: f64) -> Self {
        Self {
            nx,
            ny,
            values: vec![value; nx * ny],
        }
    }

    fn index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.nx && j < self.ny,
            "column ({}, {}) outside {}x{} map",
            i,
            j,
            self.nx,
            self.ny
        );
        i * self.ny + j
    }

    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[self.index(i, j)]
    }

    pub fn set_value(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.values[idx] = value;
    }

    /// Checks that the map covers exactly `nx` by `ny` columns.
    pub fn check_dimensions(&self, nx: usize, ny: usize) -> Result<(), GridError> {
        if self.nx != nx || self.ny != ny {
            return Err(GridError::GridMismatch {
                nx,
                ny,
                actual_nx: self.nx,
                actual_ny: self.ny,
            });
        }
        if self.values.len() != nx * ny {
            return Err(GridError::DimensionMismatch {
                nx,
                ny,
                expected: nx * ny,
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    /// Minimum and maximum over the columns accepted by `validity`.
    ///
    /// Returns `None` when no column is valid.
    pub fn min_max<V: ColumnValidity + ?Sized>(&self, validity: &V) -> Option<(f64, f64)> {
        let mut result: Option<(f64, f64)> = None;
        for i in 0..self.nx {
            for j in 0..self.ny {
                if !validity.is_valid_column(i, j) {
                    continue;
                }
                let v = self.value(i, j);
                result = Some(match result {
                    None => (v, v),
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                });
            }
        }
        result
    }
}

/// Grid dimensions plus the land/data mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    #[serde(default)]
    pub valid: Vec<bool>,
}

impl Grid {
    pub fn all_valid(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            valid: vec![true; nx * ny],
        }
    }

    pub fn column_count(&self) -> usize {
        self.nx * self.ny
    }

    pub fn mark_invalid(&mut self, i: usize, j: usize) {
        if self.valid.is_empty() {
            self.valid = vec![true; self.column_count()];
        }
        self.valid[i * self.ny + j] = false;
    }

    /// All `(i, j)` pairs in row-major order.
    pub fn columns(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.nx).flat_map(move |i| (0..self.ny).map(move |j| (i, j)))
    }
}

impl ColumnValidity for Grid {
    // An empty mask means every column is valid.
    fn is_valid_column(&self, i: usize, j: usize) -> bool {
        if i >= self.nx || j >= self.ny {
            return false;
        }
        self.valid.is_empty() || self.valid[i * self.ny + j]
    }
}
