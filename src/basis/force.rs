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

//! Bias forces along the collective variables.

use super::store::BasisStore;
use crate::collective_variable::CVList;
use crate::grid::Grid;
use crate::legendre::LookupTable;
use crate::Point;

/// Width of the Gaussian soft wall.
pub const WALL_WIDTH: f64 = 0.1;

/// A change of the global bounds status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    /// A non-periodic variable went above its upper bound.
    Above { dimension: usize },
    /// A non-periodic variable went below its lower bound.
    Below { dimension: usize },
    /// All variables are back inside the grid.
    Returned,
}

/// Tracks whether every non-periodic collective variable lies inside the grid.
///
/// Only transitions are reported, so a variable staying outside for many steps
/// produces a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTracker {
    in_bounds: bool,
}

impl Default for BoundaryTracker {
    fn default() -> Self {
        Self { in_bounds: true }
    }
}

impl BoundaryTracker {
    pub fn in_bounds(&self) -> bool {
        self.in_bounds
    }

    /// Classify `x` (already wrapped) and report a transition, if any.
    ///
    /// Bounds are inclusive.
    pub fn update(&mut self, grid: &dyn Grid, x: &[f64]) -> Option<BoundaryEvent> {
        let outside = x.iter().enumerate().find_map(|(dimension, &value)| {
            if grid.periodic(dimension) {
                None
            } else if value > grid.upper(dimension) {
                Some(BoundaryEvent::Above { dimension })
            } else if value < grid.lower(dimension) {
                Some(BoundaryEvent::Below { dimension })
            } else {
                None
            }
        });
        match (self.in_bounds, outside) {
            (true, Some(event)) => {
                self.in_bounds = false;
                Some(event)
            }
            (false, None) => {
                self.in_bounds = true;
                Some(BoundaryEvent::Returned)
            }
            _ => None,
        }
    }
}

/// Gaussian restraint at both ends of a non-periodic axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftWall {
    pub spring: f64,
    pub lower: f64,
    pub upper: f64,
}

impl SoftWall {
    /// Contribution to the derivative along this axis.
    pub fn derivative(&self, x: f64) -> f64 {
        let k = self.spring;
        let gaussian = |bound: f64| (-k * (x - bound).powi(2) / (2.0 * WALL_WIDTH.powi(2))).exp();
        -2.0 * k * k * (gaussian(self.upper) + gaussian(self.lower))
    }
}

/// Subtract the gradient of the expansion at `bins` from `derivatives`.
///
/// The constant term does not contribute. Derivatives are in grid units.
pub fn add_expansion_derivatives(
    store: &BasisStore,
    table: &LookupTable,
    grid: &dyn Grid,
    bins: &[usize],
    derivatives: &mut [f64],
) {
    for coefficient in store.coefficients().iter().skip(1) {
        for (j, derivative) in derivatives.iter_mut().enumerate() {
            *derivative -= coefficient.value
                * table.basis_derivative(bins, &coefficient.index, j)
                * 2.0
                / grid.range(j);
        }
    }
}

/// Chain rule: add `derivatives[i] * ∇cv_i` to the particle forces.
pub fn apply_to_particles(derivatives: &[f64], cvs: &CVList, forces: &mut [Point]) {
    for (derivative, cv) in derivatives.iter().zip(cvs) {
        forces
            .iter_mut()
            .zip(cv.gradient())
            .for_each(|(force, gradient)| *force += gradient * *derivative);
    }
}
