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

//! Collective variables for enhanced sampling.
//!
//! A collective variable (CV) maps particle positions to a single scalar and
//! provides the gradient of that scalar with respect to every particle position.
//! Sampling methods hold a `Vec<Box<dyn CollectiveVariable>>`, one entry per grid axis.

use crate::dimension::Dimension;
use crate::{Info, Point};
use anyhow::{bail, Result};
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

/// A scalar function of the particle positions with an analytic gradient.
pub trait CollectiveVariable: std::fmt::Debug + Info + DynClone + Send {
    /// Re-evaluate value and gradient from the current positions.
    fn update(&mut self, positions: &[Point]);
    /// Value from the last update.
    fn value(&self) -> f64;
    /// Gradient from the last update, one vector per particle.
    fn gradient(&self) -> &[Point];
}

dyn_clone::clone_trait_object!(CollectiveVariable);

/// List of collective variables handed to sampling methods.
pub type CVList = [Box<dyn CollectiveVariable>];

/// Supported collective variable properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Cartesian coordinate of a single particle.
    AtomCoordinate,
}

/// Builder for constructing a collective variable from YAML or code.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectiveVariableBuilder {
    pub property: Property,
    /// Particle index.
    pub index: usize,
    #[serde(default)]
    pub dimension: Dimension,
}

impl CollectiveVariableBuilder {
    /// Construct a type-erased CV for a system of `num_particles` particles.
    pub fn build(&self, num_particles: usize) -> Result<Box<dyn CollectiveVariable>> {
        match self.property {
            Property::AtomCoordinate => {
                if self.index >= num_particles {
                    bail!(
                        "atom_coordinate: particle index {} out of range for {} particles",
                        self.index,
                        num_particles
                    );
                }
                Ok(Box::new(AtomCoordinateCV::new(
                    self.index,
                    self.dimension,
                    num_particles,
                )))
            }
        }
    }
}

/// Position of one particle projected onto a Cartesian axis.
///
/// The gradient is the unit vector along the axis on the selected particle and zero elsewhere.
#[derive(Debug, Clone)]
pub struct AtomCoordinateCV {
    index: usize,
    dimension: Dimension,
    value: f64,
    gradient: Vec<Point>,
}

impl AtomCoordinateCV {
    pub fn new(index: usize, dimension: Dimension, num_particles: usize) -> Self {
        let mut gradient = vec![Point::zeros(); num_particles];
        gradient[index] = dimension.unit_vector();
        Self {
            index,
            dimension,
            value: 0.0,
            gradient,
        }
    }
}

impl Info for AtomCoordinateCV {
    fn short_name(&self) -> Option<&'static str> {
        Some("atom_coordinate")
    }
    fn long_name(&self) -> Option<&'static str> {
        Some("Atom position projected onto dimension")
    }
}

impl CollectiveVariable for AtomCoordinateCV {
    fn update(&mut self, positions: &[Point]) {
        self.value = self.dimension.project(&positions[self.index]);
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn gradient(&self) -> &[Point] {
        &self.gradient
    }
}
