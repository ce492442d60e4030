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

//! YAML input file.
//!
//! ```yaml
//! grid:
//!   - {lower: -2.0, upper: 2.0, points: 40}
//! cvs:
//!   - {property: atom_coordinate, index: 0, dimension: x}
//! method:
//!   orders: [8]
//!   cycle_frequency: 500
//!   temperature: 1.0
//! system:
//!   num_particles: 1
//!   time_step: 0.001
//!   thermal_energy: 1.0
//!   steps: 100000
//!   potential: !double_well {height: 5.0, width: 1.0}
//! ```

use crate::basis::BasisBuilder;
use crate::collective_variable::{CollectiveVariable, CollectiveVariableBuilder};
use crate::dynamics::BrownianDynamicsBuilder;
use crate::grid::{Grid, RegularGrid};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete simulation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// Grid over collective variable space, one entry per axis.
    #[serde(default)]
    pub grid: Option<RegularGrid>,
    /// Collective variables, in grid axis order.
    pub cvs: Vec<CollectiveVariableBuilder>,
    /// Basis-function bias parameters.
    pub method: BasisBuilder,
    /// Brownian dynamics parameters.
    pub system: BrownianDynamicsBuilder,
}

impl Input {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read input file '{}'", path.display()))?;
        serde_yaml::from_str(&yaml)
            .with_context(|| format!("Cannot parse input file '{}'", path.display()))
    }

    /// Type-erased grid, if one was given.
    pub fn grid(&self) -> Option<Box<dyn Grid>> {
        self.grid
            .clone()
            .map(|grid| Box::new(grid) as Box<dyn Grid>)
    }

    /// Build all collective variables for a system of `num_particles` particles.
    pub fn build_cvs(&self, num_particles: usize) -> Result<Vec<Box<dyn CollectiveVariable>>> {
        self.cvs
            .iter()
            .map(|builder| builder.build(num_particles))
            .collect()
    }
}
