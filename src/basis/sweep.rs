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

//! Periodic update of the expansion coefficients.
//!
//! A sweep sums the histogram over all walkers, reweights it by the current bias
//! into the running unbiased estimate, and projects the logarithm of that estimate
//! back onto the Legendre basis by trapezoidal quadrature:
//!
//! ```text
//! c_k = Σ_bins w_bin Π_d P_{k_d}(x_d) (2 k_d + 1) / n_d · ln(unbiased)
//! ```
//!
//! where `w_bin` is halved for every axis on which the bin is the first or last one.

use super::store::{BasisStore, Histogram};
use crate::communicator::Communicator;
use crate::legendre::LookupTable;
use anyhow::Result;

/// Fixed parameters of every sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParameters {
    /// Steps between sweeps.
    pub cycle_frequency: usize,
    /// Scale of each sweep's contribution to the unbiased estimate.
    pub weight: f64,
    /// Convergence threshold on the squared coefficient change.
    pub tolerance: f64,
}

/// Result of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepReport {
    /// Sum of squared differences between old and new coefficients.
    pub metric: f64,
    pub converged: bool,
}

/// Run one sweep. Collective: every walker must call this at the same iteration.
pub fn update_bias(
    store: &mut BasisStore,
    table: &LookupTable,
    communicator: &dyn Communicator,
    parameters: &SweepParameters,
    temperature: f64,
) -> Result<SweepReport> {
    store.reduce(communicator)?;
    reweight(store, table, parameters, temperature);

    let previous: Vec<f64> = store.coefficients().values().collect();
    store.coefficients_mut().fill(0.0);
    store.reset_histogram();

    let projected = project(store, table);
    store.coefficients_mut().copy_from_slice(&projected);

    let metric = previous
        .iter()
        .zip(&projected)
        .skip(1)
        .map(|(old, new)| (old - new).powi(2))
        .sum();
    Ok(SweepReport {
        metric,
        converged: metric < parameters.tolerance,
    })
}

/// Fold the reduced histogram into the unbiased estimate.
///
/// Empty bins count as one visit so that no bin keeps a zero probability.
fn reweight(
    store: &mut BasisStore,
    table: &LookupTable,
    parameters: &SweepParameters,
    temperature: f64,
) {
    let bias = store.bias_profile(table);
    let scale = parameters.weight / parameters.cycle_frequency as f64;
    for (offset, bias) in bias.into_iter().enumerate() {
        let mut count = store.histogram().value(offset);
        if count == 0.0 {
            count = 1.0;
            store.histogram_mut().set_value(offset, count);
        }
        store.unbiased_mut()[offset] += count * (bias / temperature).exp() * scale;
    }
}

/// Quadrature weight of a bin relative to an interior bin.
fn trapezoid_weight(bins: &[usize], num_bins: &[usize]) -> f64 {
    bins.iter()
        .zip(num_bins)
        .filter(|(&bin, &n)| bin == 0 || bin + 1 == n)
        .fold(1.0, |weight, _| weight * 0.5)
}

/// Coefficients from the current unbiased estimate; the constant term is left at zero.
///
/// Bins that were never visited are skipped.
pub(super) fn project(store: &BasisStore, table: &LookupTable) -> Vec<f64> {
    let histogram: &Histogram = store.histogram();
    let num_bins = histogram.shape().radices();
    let log_weights: Vec<Option<f64>> = histogram
        .iter()
        .zip(store.unbiased())
        .map(|(bin, &unbiased)| {
            (unbiased != 0.0).then(|| unbiased.ln() * trapezoid_weight(&bin.index, num_bins))
        })
        .collect();

    store
        .coefficients()
        .iter()
        .enumerate()
        .map(|(k, coefficient)| {
            if k == 0 {
                return 0.0;
            }
            histogram
                .iter()
                .zip(&log_weights)
                .filter_map(|(bin, log_weight)| {
                    let normalized_basis: f64 = bin
                        .index
                        .iter()
                        .zip(&coefficient.index)
                        .enumerate()
                        .map(|(d, (&b, &order))| {
                            let axis = table.axis(d);
                            axis.value(b, order) * (2 * order + 1) as f64
                                / axis.num_bins() as f64
                        })
                        .product();
                    log_weight.map(|w| normalized_basis * w)
                })
                .sum()
        })
        .collect()
}
