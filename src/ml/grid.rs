//! Hyperparameter grid enumeration
//!
//! A grid is a list of named integer axes, each with a closed candidate
//! list. `points()` enumerates the cartesian product in lexicographic
//! order: the first declared axis varies slowest. That enumeration order
//! is the tie-break order of the search, so it is part of the contract,
//! not an implementation detail.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperGrid {
    axes: Vec<GridAxis>,
}

impl HyperGrid {
    pub fn new() -> Self {
        Self { axes: Vec::new() }
    }

    /// Add an axis with an explicit candidate list.
    pub fn axis(mut self, name: &str, values: Vec<i64>) -> Self {
        self.axes.push(GridAxis {
            name: name.to_string(),
            values,
        });
        self
    }

    /// Add an axis covering `min..=max` in `step` increments.
    pub fn axis_range(self, name: &str, min: i64, max: i64, step: i64) -> Self {
        assert!(step > 0, "step must be positive");
        let values = (min..=max).step_by(step as usize).collect();
        self.axis(name, values)
    }

    pub fn n_axes(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    /// Number of points the grid enumerates. A grid with no axes, or with
    /// any empty axis, has no points.
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All points in enumeration order.
    pub fn points(&self) -> Vec<GridPoint> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut points = vec![GridPoint { values: Vec::new() }];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(points.len() * axis.values.len());
            for point in &points {
                for &value in &axis.values {
                    let mut values = point.values.clone();
                    values.push((axis.name.clone(), value));
                    next.push(GridPoint { values });
                }
            }
            points = next;
        }
        points
    }
}

/// One grid point: a value per axis, in axis declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    values: Vec<(String, i64)>,
}

impl GridPoint {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn values(&self) -> &[(String, i64)] {
        &self.values
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}
