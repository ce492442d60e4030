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

//! # Overdamped Langevin dynamics
//!
//! A minimal driver for sampling methods: independent particles in an external
//! potential, integrated with the Euler-Maruyama scheme
//!
//! ```text
//! x(t + dt) = x(t) + F dt / γ + sqrt(2 kT dt / γ) ξ
//! ```
//!
//! where `ξ` is a vector of standard normal numbers. Overdamped dynamics has no
//! velocities and hence no kinetic temperature, so snapshots report a temperature
//! of zero.

use crate::collective_variable::CollectiveVariable;
use crate::method::{Method, StepOutcome};
use crate::snapshot::SystemSnapshot;
use crate::{Point, Snapshot};
use anyhow::Result;
use average::{Estimate, Mean};
use derive_builder::Builder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Analytic potential acting on every particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExternalPotential {
    /// No external force.
    #[default]
    Flat,
    /// `U(x) = height ((x / width)² - 1)²` along x, with minima at `x = ±width`.
    DoubleWell { height: f64, width: f64 },
}

impl ExternalPotential {
    pub fn energy(&self, position: &Point) -> f64 {
        match self {
            Self::Flat => 0.0,
            Self::DoubleWell { height, width } => {
                height * ((position.x / width).powi(2) - 1.0).powi(2)
            }
        }
    }

    /// Negative gradient of the energy.
    pub fn force(&self, position: &Point) -> Point {
        match self {
            Self::Flat => Point::zeros(),
            Self::DoubleWell { height, width } => {
                let x = position.x / width;
                Point::new(-4.0 * height * (x * x - 1.0) * x / width, 0.0, 0.0)
            }
        }
    }
}

/// Seed of the random number generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Seed {
    #[default]
    Hardware,
    /// Fixed seed; each walker offsets it by its id.
    Fixed(u64),
}

/// Brownian dynamics of non-interacting particles.
#[derive(Debug, Clone, Builder)]
#[builder(derive(Deserialize, Serialize, Debug), build_fn(validate = "Self::validate"))]
#[builder_struct_attr(serde(deny_unknown_fields))]
pub struct BrownianDynamics {
    num_particles: usize,
    /// Integration time step.
    time_step: f64,
    /// Friction coefficient, γ.
    #[builder(default = "1.0")]
    friction: f64,
    /// Thermal energy, kT.
    thermal_energy: f64,
    #[builder(default)]
    potential: ExternalPotential,
    /// Number of integration steps.
    steps: usize,
    /// Starting positions; all particles start at the origin if empty.
    #[builder(default)]
    initial_positions: Vec<Point>,
    #[builder(default)]
    seed: Seed,
}

impl BrownianDynamicsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(dt) = self.time_step {
            if dt <= 0.0 {
                return Err(format!("time step must be positive, got {}", dt));
            }
        }
        if let Some(friction) = self.friction {
            if friction <= 0.0 {
                return Err(format!("friction must be positive, got {}", friction));
            }
        }
        if let Some(kt) = self.thermal_energy {
            if kt < 0.0 {
                return Err(format!("thermal energy must be non-negative, got {}", kt));
            }
        }
        if let (Some(n), Some(positions)) = (self.num_particles, &self.initial_positions) {
            if !positions.is_empty() && positions.len() != n {
                return Err(format!(
                    "{} initial positions given for {} particles",
                    positions.len(),
                    n
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of [`BrownianDynamics::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Integration steps carried out.
    pub steps: usize,
    /// True if the method ended the run before the last step.
    pub stopped_early: bool,
    /// Average of each collective variable over the run.
    pub mean_cvs: Vec<f64>,
    pub final_positions: Vec<Point>,
}

impl BrownianDynamics {
    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn potential(&self) -> &ExternalPotential {
        &self.potential
    }

    /// Snapshot at the starting positions.
    pub fn initial_snapshot(&self, walker_id: usize) -> SystemSnapshot {
        let positions = if self.initial_positions.is_empty() {
            vec![Point::zeros(); self.num_particles]
        } else {
            self.initial_positions.clone()
        };
        SystemSnapshot::new(positions, walker_id)
    }

    fn rng(&self, walker_id: usize) -> StdRng {
        match self.seed {
            Seed::Hardware => StdRng::from_entropy(),
            Seed::Fixed(seed) => StdRng::seed_from_u64(seed.wrapping_add(walker_id as u64)),
        }
    }

    /// Replace all forces by those of the external potential.
    fn external_forces(&self, snapshot: &mut SystemSnapshot) {
        let forces: Vec<Point> = snapshot
            .positions()
            .iter()
            .map(|position| self.potential.force(position))
            .collect();
        snapshot.forces_mut().copy_from_slice(&forces);
    }

    /// One Euler-Maruyama step using the current forces.
    fn integrate(&self, snapshot: &mut SystemSnapshot, rng: &mut impl Rng) {
        let drift = self.time_step / self.friction;
        let noise = (2.0 * self.thermal_energy * drift).sqrt();
        let forces = snapshot.forces().to_vec();
        for (position, force) in snapshot.positions_mut().iter_mut().zip(forces) {
            let xi = Point::from_fn(|_, _| rng.sample(StandardNormal));
            *position += force * drift + xi * noise;
        }
    }

    /// Propagate a walker, calling the method hooks around every step.
    ///
    /// `progress` is called with the iteration number after each step.
    pub fn run<M: Method<SystemSnapshot>>(
        &self,
        method: &mut M,
        cvs: &mut [Box<dyn CollectiveVariable>],
        walker_id: usize,
        mut progress: impl FnMut(usize),
    ) -> Result<RunSummary> {
        let mut rng = self.rng(walker_id);
        let mut snapshot = self.initial_snapshot(walker_id);
        self.external_forces(&mut snapshot);
        cvs.iter_mut().for_each(|cv| cv.update(snapshot.positions()));
        method.pre_simulation(&mut snapshot, cvs)?;

        let mut means: Vec<Mean> = vec![Mean::new(); cvs.len()];
        let mut steps = 0;
        let mut stopped_early = false;
        for iteration in 1..=self.steps {
            self.integrate(&mut snapshot, &mut rng);
            snapshot.set_iteration(iteration);
            self.external_forces(&mut snapshot);
            cvs.iter_mut().for_each(|cv| cv.update(snapshot.positions()));
            let outcome = method.post_integration(&mut snapshot, cvs)?;
            means
                .iter_mut()
                .zip(cvs.iter())
                .for_each(|(mean, cv)| mean.add(cv.value()));
            steps = iteration;
            progress(iteration);
            if outcome == StepOutcome::Stop {
                stopped_early = iteration < self.steps;
                log::info!("Walker {}: stopping at step {}", walker_id, iteration);
                break;
            }
        }
        method.post_simulation(&mut snapshot, cvs)?;

        Ok(RunSummary {
            steps,
            stopped_early,
            mean_cvs: means.iter().map(|mean| mean.mean()).collect(),
            final_positions: snapshot.positions().to_vec(),
        })
    }
}
