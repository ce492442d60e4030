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

//! State of the simulated system as seen by a sampling method.

use crate::Point;

/// A trait for objects that have a temperature
pub trait Temperature {
    /// Instantaneous temperature; zero when it is undefined for the system.
    fn temperature(&self) -> f64;
    /// Set the temperature
    fn set_temperature(&mut self, _temperature: f64) -> anyhow::Result<()> {
        Err(anyhow::anyhow!(
            "Setting the temperature is not implemented"
        ))
    }
}

/// Per-step view of the simulation handed to sampling hooks.
pub trait Snapshot: Temperature {
    /// Current integration step.
    fn iteration(&self) -> usize;
    /// Identifier of the walker that owns this snapshot.
    fn walker_id(&self) -> usize;
    fn positions(&self) -> &[Point];
    /// Forces on all particles; sampling methods add their bias here.
    fn forces_mut(&mut self) -> &mut [Point];
}

/// Plain snapshot owning positions and forces.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    temperature: f64,
    iteration: usize,
    walker_id: usize,
    positions: Vec<Point>,
    forces: Vec<Point>,
}

impl SystemSnapshot {
    pub fn new(positions: Vec<Point>, walker_id: usize) -> Self {
        let forces = vec![Point::zeros(); positions.len()];
        Self {
            temperature: 0.0,
            iteration: 0,
            walker_id,
            positions,
            forces,
        }
    }

    pub fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    pub fn positions_mut(&mut self) -> &mut [Point] {
        &mut self.positions
    }

    pub fn forces(&self) -> &[Point] {
        &self.forces
    }

    /// Reset all forces to zero.
    pub fn clear_forces(&mut self) {
        self.forces.fill(Point::zeros());
    }
}

impl Temperature for SystemSnapshot {
    fn temperature(&self) -> f64 {
        self.temperature
    }
    fn set_temperature(&mut self, temperature: f64) -> anyhow::Result<()> {
        if temperature < 0.0 {
            anyhow::bail!("temperature must be non-negative");
        }
        self.temperature = temperature;
        Ok(())
    }
}

impl Snapshot for SystemSnapshot {
    fn iteration(&self) -> usize {
        self.iteration
    }
    fn walker_id(&self) -> usize {
        self.walker_id
    }
    fn positions(&self) -> &[Point] {
        &self.positions
    }
    fn forces_mut(&mut self) -> &mut [Point] {
        &mut self.forces
    }
}
