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

//! # Basis-function sampling
//!
//! The free energy along the collective variables is expanded in products of
//! Legendre polynomials on the grid rescaled to `[-1, 1]`:
//!
//! ```text
//! B(x) = Σ_k c_k Π_d P_{k_d}(x_d)
//! ```
//!
//! Visits are counted in a histogram, and every `cycle_frequency` steps the
//! histogram is reweighted into an unbiased estimate whose logarithm is projected
//! onto the basis to give new coefficients `c_k`. Between sweeps the negative
//! gradient of `B` is applied as a force on the particles.

mod checkpoint;
mod force;
mod store;
mod sweep;

pub use checkpoint::{Checkpoint, CoefficientRestore, UnbiasedRestore};
pub use force::{
    add_expansion_derivatives, apply_to_particles, BoundaryEvent, BoundaryTracker, SoftWall,
    WALL_WIDTH,
};
pub use store::{BasisStore, Coefficients, Histogram};
pub use sweep::{update_bias, SweepParameters, SweepReport};

use crate::collective_variable::CVList;
use crate::communicator::Communicator;
use crate::grid::Grid;
use crate::legendre::LookupTable;
use crate::method::{Method, StepOutcome};
use crate::{BasisError, Info, Snapshot};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

fn default_weight() -> f64 {
    1.0
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// User input for [`BasisFunctionBias`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BasisBuilder {
    /// Highest polynomial order along each collective variable.
    #[validate(length(min = 1))]
    pub orders: Vec<usize>,
    /// Steps between sweeps.
    #[validate(range(min = 1))]
    pub cycle_frequency: usize,
    /// Scale of each sweep's contribution to the unbiased histogram.
    #[serde(default = "default_weight")]
    #[validate(range(min = 0.0))]
    pub weight: f64,
    /// Used when the system reports no temperature; zero means undefined.
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub temperature: f64,
    /// Convergence threshold on the squared change of the coefficients.
    #[serde(default = "default_tolerance")]
    #[validate(range(min = 1e-20))]
    pub tolerance: f64,
    /// Stop the run once the bias has converged.
    #[serde(default)]
    pub convergence_exit: bool,
    /// Restart from checkpoint files, if present.
    #[serde(default)]
    pub read: bool,
    /// Suffix of the histogram checkpoint, `basis{suffix}.out`.
    #[serde(default)]
    pub basis_file: String,
    /// Suffix of the coefficient checkpoint, `coeff{suffix}.out`.
    #[serde(default)]
    pub coeff_file: String,
    /// Soft-wall spring constant per collective variable; default zero.
    #[serde(default)]
    pub springs: Option<Vec<f64>>,
    /// Soft-wall positions; default the grid bounds.
    #[serde(default)]
    pub upper_bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub lower_bounds: Option<Vec<f64>>,
    /// Directory for checkpoint files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl BasisBuilder {
    /// Minimal input with defaults for everything optional.
    pub fn new(orders: Vec<usize>, cycle_frequency: usize) -> Self {
        Self {
            orders,
            cycle_frequency,
            weight: default_weight(),
            temperature: 0.0,
            tolerance: default_tolerance(),
            convergence_exit: false,
            read: false,
            basis_file: String::new(),
            coeff_file: String::new(),
            springs: None,
            upper_bounds: None,
            lower_bounds: None,
            output_dir: default_output_dir(),
        }
    }

    /// Create the method for `grid`.
    ///
    /// Fatal configuration errors are broadcast through `communicator` before
    /// they are returned.
    pub fn build(
        &self,
        grid: Option<Box<dyn Grid>>,
        communicator: Box<dyn Communicator>,
    ) -> Result<BasisFunctionBias> {
        let Some(grid) = grid else {
            communicator.abort(&BasisError::MissingGrid.to_string());
            return Err(BasisError::MissingGrid.into());
        };
        self.validate()?;
        let dimension = grid.dimension();

        let mut orders = self.orders.clone();
        if normalize_orders(&mut orders, dimension) {
            log::warn!(
                "{} polynomial order(s) given for {} collective variable(s); using {:?}",
                self.orders.len(),
                dimension,
                orders
            );
        }

        let walls = self.soft_walls(grid.as_ref())?;
        let num_bins = grid.num_bins();
        Ok(BasisFunctionBias {
            table: LookupTable::new(&num_bins, &orders),
            store: BasisStore::new(&num_bins, &orders),
            parameters: SweepParameters {
                cycle_frequency: self.cycle_frequency,
                weight: self.weight,
                tolerance: self.tolerance,
            },
            fallback_temperature: self.temperature,
            convergence_exit: self.convergence_exit,
            read: self.read,
            checkpoint: Checkpoint::new(&self.output_dir, &self.basis_file, &self.coeff_file),
            walls,
            boundary: BoundaryTracker::default(),
            values: vec![0.0; dimension],
            derivatives: vec![0.0; dimension],
            sweeps: 0,
            last_metric: None,
            converged: false,
            orders,
            grid,
            communicator,
        })
    }

    /// One wall per non-periodic axis.
    fn soft_walls(&self, grid: &dyn Grid) -> Result<Vec<Option<SoftWall>>> {
        let dimension = grid.dimension();
        for (name, list) in [
            ("springs", &self.springs),
            ("upper_bounds", &self.upper_bounds),
            ("lower_bounds", &self.lower_bounds),
        ] {
            if let Some(list) = list {
                if list.len() != dimension {
                    bail!(
                        "{} has {} value(s) but the grid has {} dimension(s)",
                        name,
                        list.len(),
                        dimension
                    );
                }
            }
        }
        let pick = |list: &Option<Vec<f64>>, axis: usize, default: f64| {
            list.as_ref().map_or(default, |values| values[axis])
        };
        Ok((0..dimension)
            .map(|axis| {
                (!grid.periodic(axis)).then(|| SoftWall {
                    spring: pick(&self.springs, axis, 0.0),
                    lower: pick(&self.lower_bounds, axis, grid.lower(axis)),
                    upper: pick(&self.upper_bounds, axis, grid.upper(axis)),
                })
            })
            .collect())
    }
}

/// Resize `orders` to `dimension`, replicating the first entry, if the lengths differ.
///
/// Returns true if a correction was applied. `orders` must not be empty.
pub fn normalize_orders(orders: &mut Vec<usize>, dimension: usize) -> bool {
    if orders.len() == dimension {
        return false;
    }
    let first = orders.first().copied().unwrap_or_default();
    orders.clear();
    orders.resize(dimension, first);
    true
}

/// Adaptive bias expanded in Legendre polynomials.
#[derive(Debug)]
pub struct BasisFunctionBias {
    grid: Box<dyn Grid>,
    communicator: Box<dyn Communicator>,
    orders: Vec<usize>,
    table: LookupTable,
    store: BasisStore,
    parameters: SweepParameters,
    fallback_temperature: f64,
    convergence_exit: bool,
    read: bool,
    checkpoint: Checkpoint,
    /// `None` for periodic axes.
    walls: Vec<Option<SoftWall>>,
    boundary: BoundaryTracker,
    /// Collective variables wrapped into the grid.
    values: Vec<f64>,
    derivatives: Vec<f64>,
    sweeps: usize,
    last_metric: Option<f64>,
    converged: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    orders: &'a [usize],
    num_coefficients: usize,
    sweeps: usize,
    last_metric: Option<f64>,
    converged: bool,
    walkers: usize,
}

impl BasisFunctionBias {
    /// Number of completed sweeps, including restored ones.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn store(&self) -> &BasisStore {
        &self.store
    }

    pub fn table(&self) -> &LookupTable {
        &self.table
    }

    pub fn grid(&self) -> &dyn Grid {
        self.grid.as_ref()
    }

    /// Polynomial orders after normalization.
    pub fn orders(&self) -> &[usize] {
        &self.orders
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Convergence metric of the latest sweep.
    pub fn last_metric(&self) -> Option<f64> {
        self.last_metric
    }

    pub fn in_bounds(&self) -> bool {
        self.boundary.in_bounds()
    }

    /// Bin centers and the negative bias at every bin, in flat order.
    pub fn free_energy(&self) -> Vec<(Vec<f64>, f64)> {
        self.store
            .histogram()
            .iter()
            .zip(self.store.bias_profile(&self.table))
            .map(|(bin, bias)| {
                let centers = bin
                    .index
                    .iter()
                    .enumerate()
                    .map(|(axis, &b)| self.grid.bin_center(axis, b))
                    .collect();
                (centers, -bias)
            })
            .collect()
    }

    /// Log and return a fatal configuration error after aborting all walkers.
    fn abort(&self, error: BasisError) -> anyhow::Error {
        self.communicator.abort(&error.to_string());
        error.into()
    }

    /// Temperature of the reweighting; the snapshot's if defined, otherwise the fallback.
    fn resolve_temperature(&self, temperature: f64) -> Result<f64> {
        if temperature > 0.0 && temperature.is_finite() {
            Ok(temperature)
        } else if self.fallback_temperature > 0.0 {
            Ok(self.fallback_temperature)
        } else {
            Err(self.abort(BasisError::UndefinedTemperature))
        }
    }

    fn restore(&mut self) -> Result<()> {
        log::info!(
            "Reading checkpoint {} and {}",
            self.checkpoint.coeff_path().display(),
            self.checkpoint.basis_path().display()
        );
        let restored = self
            .checkpoint
            .read_coefficients(self.store.coefficients_mut())?;
        self.sweeps = restored.sweeps();
        if let CoefficientRestore::Fresh { .. } = restored {
            log::info!("Checkpoint holds no coefficients; starting from a flat bias");
        }
        match self
            .checkpoint
            .read_unbiased(self.grid.dimension(), self.store.unbiased_mut())?
        {
            UnbiasedRestore::Unsupported { dimension } => log::warn!(
                "Restoring the unbiased histogram is not supported in {} dimensions; it starts from zero",
                dimension
            ),
            UnbiasedRestore::Partial { .. } | UnbiasedRestore::Complete => {}
        }
        log::info!("Restarting after {} sweep(s)", self.sweeps);
        Ok(())
    }

    fn sweep(&mut self, walker: usize, temperature: f64) -> Result<StepOutcome> {
        let temperature = self.resolve_temperature(temperature)?;
        let report = update_bias(
            &mut self.store,
            &self.table,
            self.communicator.as_ref(),
            &self.parameters,
            temperature,
        )?;
        self.sweeps += 1;
        self.last_metric = Some(report.metric);
        if self.communicator.is_root() {
            let bias = self.store.bias_profile(&self.table);
            self.checkpoint
                .write(self.sweeps, self.grid.as_ref(), &self.store, &bias)?;
        }
        log::info!(
            "Walker {}: sweep {} (metric {:.3e})",
            walker,
            self.sweeps,
            report.metric
        );
        if report.converged {
            self.converged = true;
            log::info!(
                "Bias converged after {} sweep(s) (metric {:.3e} < {:.3e})",
                self.sweeps,
                report.metric,
                self.parameters.tolerance
            );
            if self.convergence_exit {
                return Ok(StepOutcome::Stop);
            }
        }
        Ok(StepOutcome::Continue)
    }
}

fn log_boundary_event(walker: usize, grid: &dyn Grid, event: BoundaryEvent) {
    match event {
        BoundaryEvent::Above { dimension } => log::warn!(
            "Walker {}: collective variable {} above upper bound {}; sampling suspended",
            walker,
            dimension,
            grid.upper(dimension)
        ),
        BoundaryEvent::Below { dimension } => log::warn!(
            "Walker {}: collective variable {} below lower bound {}; sampling suspended",
            walker,
            dimension,
            grid.lower(dimension)
        ),
        BoundaryEvent::Returned => log::info!(
            "Walker {}: collective variables back within bounds; sampling resumed",
            walker
        ),
    }
}

impl Info for BasisFunctionBias {
    fn short_name(&self) -> Option<&'static str> {
        Some("basis_function")
    }
    fn long_name(&self) -> Option<&'static str> {
        Some("Adaptive basis-function bias in Legendre polynomials")
    }
    fn citation(&self) -> Option<&'static str> {
        Some("doi:10.1063/1.4927147")
    }
}

impl<S: Snapshot> Method<S> for BasisFunctionBias {
    fn pre_simulation(&mut self, _snapshot: &mut S, cvs: &CVList) -> Result<()> {
        if cvs.len() != self.grid.dimension() {
            return Err(self.abort(BasisError::DimensionMismatch {
                grid: self.grid.dimension(),
                cvs: cvs.len(),
            }));
        }
        let num_bins = self.grid.num_bins();
        self.store = BasisStore::new(&num_bins, &self.orders);
        self.boundary = BoundaryTracker::default();
        self.sweeps = 0;
        self.last_metric = None;
        self.converged = false;

        if !self.read {
            return Ok(());
        }
        if !self.checkpoint.exists() {
            log::info!(
                "No checkpoint found in {}; starting fresh",
                self.checkpoint.coeff_path().parent().map_or_else(
                    || ".".to_string(),
                    |dir| dir.display().to_string()
                )
            );
            return Ok(());
        }
        self.restore().map_err(|error| {
            self.communicator.abort(&error.to_string());
            error
        })
    }

    fn post_integration(&mut self, snapshot: &mut S, cvs: &CVList) -> Result<StepOutcome> {
        let grid = self.grid.as_ref();
        for (axis, (value, cv)) in self.values.iter_mut().zip(cvs).enumerate() {
            *value = grid.wrap(axis, cv.value());
        }
        if let Some(event) = self.boundary.update(grid, &self.values) {
            log_boundary_event(snapshot.walker_id(), grid, event);
        }
        let in_bounds = self.boundary.in_bounds();
        let bins = grid.indices(&self.values);
        if in_bounds {
            self.store.accumulate(&bins);
        }

        // all walkers sweep at the same iteration, also when out of bounds
        let outcome = if snapshot.iteration() % self.parameters.cycle_frequency == 0 {
            self.sweep(snapshot.walker_id(), snapshot.temperature())?
        } else {
            StepOutcome::Continue
        };

        self.derivatives.fill(0.0);
        if in_bounds {
            add_expansion_derivatives(
                &self.store,
                &self.table,
                self.grid.as_ref(),
                &bins,
                &mut self.derivatives,
            );
        }
        let walls = self.walls.iter().zip(&self.values);
        for (derivative, (wall, &value)) in self.derivatives.iter_mut().zip(walls) {
            if let Some(wall) = wall {
                *derivative += wall.derivative(value);
            }
        }
        apply_to_particles(&self.derivatives, cvs, snapshot.forces_mut());
        Ok(outcome)
    }

    fn post_simulation(&mut self, _snapshot: &mut S, _cvs: &CVList) -> Result<()> {
        log::info!(
            "Run has finished after {} sweep(s); converged: {}",
            self.sweeps,
            self.converged
        );
        Ok(())
    }

    fn to_yaml(&self) -> Option<serde_yaml::Value> {
        serde_yaml::to_value(Summary {
            orders: &self.orders,
            num_coefficients: self.store.coefficients().len(),
            sweeps: self.sweeps,
            last_metric: self.last_metric,
            converged: self.converged,
            walkers: self.communicator.size(),
        })
        .ok()
    }
}
