// Copyright 2025 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Discretization of collective variable space.

use anyhow::{bail, Result};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Regular grid over collective variable space.
///
/// Each axis is split into `num_points` equally wide bins between `lower` and `upper`.
pub trait Grid: std::fmt::Debug + Send + Sync {
    /// Number of axes.
    fn dimension(&self) -> usize;
    fn lower(&self, axis: usize) -> f64;
    fn upper(&self, axis: usize) -> f64;
    fn periodic(&self, axis: usize) -> bool;
    /// Number of bins along an axis.
    fn num_points(&self, axis: usize) -> usize;

    /// Per-axis bin indices of a coordinate; values outside the grid are clamped
    /// into the first or last bin.
    fn indices(&self, x: &[f64]) -> Vec<usize> {
        x.iter()
            .enumerate()
            .map(|(axis, &value)| {
                let n = self.num_points(axis);
                let bin = ((value - self.lower(axis)) / self.spacing(axis)).floor();
                (bin.max(0.0) as usize).min(n - 1)
            })
            .collect()
    }

    /// Length of an axis.
    fn range(&self, axis: usize) -> f64 {
        self.upper(axis) - self.lower(axis)
    }

    /// Width of a bin along an axis.
    fn spacing(&self, axis: usize) -> f64 {
        self.range(axis) / self.num_points(axis) as f64
    }

    /// Coordinate of the center of a bin along an axis.
    fn bin_center(&self, axis: usize, bin: usize) -> f64 {
        (bin as f64 + 0.5).mul_add(self.spacing(axis), self.lower(axis))
    }

    /// Shift a periodic coordinate by one axis length if it lies outside `[lower, upper)`.
    /// Non-periodic coordinates are returned unchanged.
    fn wrap(&self, axis: usize, value: f64) -> f64 {
        if !self.periodic(axis) {
            return value;
        }
        if value < self.lower(axis) {
            value + self.range(axis)
        } else if value >= self.upper(axis) {
            value - self.range(axis)
        } else {
            value
        }
    }

    /// Number of bins in the whole grid.
    fn num_bins(&self) -> Vec<usize> {
        (0..self.dimension()).map(|axis| self.num_points(axis)).collect()
    }
}

/// One axis of a [`RegularGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Getters)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_axis"))]
pub struct Axis {
    lower: f64,
    upper: f64,
    /// Number of bins.
    #[serde(alias = "number points")]
    #[validate(range(min = 1))]
    points: usize,
    #[serde(default)]
    periodic: bool,
}

impl Axis {
    pub fn new(lower: f64, upper: f64, points: usize, periodic: bool) -> Self {
        Self {
            lower,
            upper,
            points,
            periodic,
        }
    }
}

fn validate_axis(axis: &Axis) -> Result<(), ValidationError> {
    if !(axis.lower.is_finite() && axis.upper.is_finite()) {
        return Err(ValidationError::new("grid bounds must be finite"));
    }
    if axis.upper <= axis.lower {
        return Err(ValidationError::new("upper grid bound must exceed lower bound"));
    }
    Ok(())
}

/// Grid with evenly spaced bins along one to three axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Axis>", into = "Vec<Axis>")]
pub struct RegularGrid {
    axes: Vec<Axis>,
}

impl RegularGrid {
    /// Maximum number of axes.
    pub const MAX_DIMENSION: usize = 3;

    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        if axes.is_empty() || axes.len() > Self::MAX_DIMENSION {
            bail!(
                "grid must have between 1 and {} axes, found {}",
                Self::MAX_DIMENSION,
                axes.len()
            );
        }
        for axis in &axes {
            axis.validate()?;
        }
        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }
}

impl TryFrom<Vec<Axis>> for RegularGrid {
    type Error = anyhow::Error;
    fn try_from(axes: Vec<Axis>) -> Result<Self> {
        Self::new(axes)
    }
}

impl From<RegularGrid> for Vec<Axis> {
    fn from(grid: RegularGrid) -> Self {
        grid.axes
    }
}

impl Grid for RegularGrid {
    fn dimension(&self) -> usize {
        self.axes.len()
    }
    fn lower(&self, axis: usize) -> f64 {
        self.axes[axis].lower
    }
    fn upper(&self, axis: usize) -> f64 {
        self.axes[axis].upper
    }
    fn periodic(&self, axis: usize) -> bool {
        self.axes[axis].periodic
    }
    fn num_points(&self, axis: usize) -> usize {
        self.axes[axis].points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> RegularGrid {
        RegularGrid::new(vec![
            Axis::new(0.0, 10.0, 10, false),
            Axis::new(-3.0, 3.0, 6, true),
        ])
        .unwrap()
    }

    #[test]
    fn deserialize_grid() {
        let yaml = r#"
- lower: 0.0
  upper: 10.0
  points: 10
- lower: -3.0
  upper: 3.0
  points: 6
  periodic: true
"#;
        let grid: RegularGrid = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(grid.dimension(), 2);
        assert!(!grid.periodic(0));
        assert!(grid.periodic(1));
        assert_eq!(grid.num_bins(), vec![10, 6]);
        assert_eq!(grid.axes()[1].points(), &6);
    }

    #[test]
    fn reject_invalid_grids() {
        assert!(serde_yaml::from_str::<RegularGrid>("[]").is_err());
        let inverted = "- {lower: 1.0, upper: 0.0, points: 5}";
        assert!(serde_yaml::from_str::<RegularGrid>(inverted).is_err());
        let empty = "- {lower: 0.0, upper: 1.0, points: 0}";
        assert!(serde_yaml::from_str::<RegularGrid>(empty).is_err());
        let four = "- {lower: 0.0, upper: 1.0, points: 2}\n".repeat(4);
        assert!(serde_yaml::from_str::<RegularGrid>(&four).is_err());
    }

    #[test]
    fn indices_and_clamping() {
        let grid = grid();
        assert_eq!(grid.indices(&[0.0, -3.0]), vec![0, 0]);
        assert_eq!(grid.indices(&[4.5, 0.5]), vec![4, 3]);
        assert_eq!(grid.indices(&[9.999, 2.999]), vec![9, 5]);
        assert_eq!(grid.indices(&[10.0, 3.0]), vec![9, 5]);
        assert_eq!(grid.indices(&[-1.0, -4.0]), vec![0, 0]);
    }

    #[test]
    fn bin_centers() {
        let grid = grid();
        assert_relative_eq!(grid.bin_center(0, 0), 0.5);
        assert_relative_eq!(grid.bin_center(0, 9), 9.5);
        assert_relative_eq!(grid.bin_center(1, 0), -2.5);
        assert_relative_eq!(grid.spacing(1), 1.0);
    }

    #[test]
    fn periodic_wrap() {
        let grid = grid();
        assert_relative_eq!(grid.wrap(1, -3.5), 2.5);
        assert_relative_eq!(grid.wrap(1, 3.0), -3.0);
        assert_relative_eq!(grid.wrap(1, 1.0), 1.0);
        // non-periodic axes are left alone
        assert_relative_eq!(grid.wrap(0, 11.0), 11.0);
    }
}
