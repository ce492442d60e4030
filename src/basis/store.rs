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

//! Histogram, expansion coefficients, and the running unbiased estimate.

use crate::communicator::Communicator;
use crate::index::{BinSpace, IndexedTensor, OrderSpace, Shape};
use crate::legendre::LookupTable;
use anyhow::Result;

/// Visitation counts over bin space.
pub type Histogram = IndexedTensor<BinSpace>;
/// Expansion coefficients over order space.
pub type Coefficients = IndexedTensor<OrderSpace>;

/// State of the expansion that evolves during a run.
///
/// Lengths are `Π nbins[d]` for the histogram and the unbiased estimate and
/// `Π (order[d] + 1)` for the coefficients. They never change after construction.
#[derive(Debug, Clone)]
pub struct BasisStore {
    histogram: Histogram,
    coefficients: Coefficients,
    unbiased: Vec<f64>,
    /// Flat buffer handed to the collective reduction.
    reduction: Vec<f64>,
}

impl BasisStore {
    pub fn new(num_bins: &[usize], orders: &[usize]) -> Self {
        let histogram = Histogram::zeros(Shape::new(num_bins.to_vec()));
        let coefficients =
            Coefficients::zeros(Shape::new(orders.iter().map(|order| order + 1).collect()));
        let len = histogram.len();
        Self {
            histogram,
            coefficients,
            unbiased: vec![0.0; len],
            reduction: vec![0.0; len],
        }
    }

    /// Count one visit to a bin.
    pub fn accumulate(&mut self, bins: &[usize]) {
        let offset = self.histogram.shape().flatten(bins);
        self.histogram.add_value(offset, 1.0);
    }

    /// Sum the histogram over all walkers, in place.
    pub fn reduce(&mut self, communicator: &dyn Communicator) -> Result<()> {
        self.histogram.copy_to_slice(&mut self.reduction);
        communicator.all_reduce_sum(&mut self.reduction)?;
        self.histogram.copy_from_slice(&self.reduction);
        Ok(())
    }

    /// Zero the histogram and the reduction buffer.
    pub fn reset_histogram(&mut self) {
        self.histogram.fill(0.0);
        self.reduction.fill(0.0);
    }

    /// Value of the expansion at a bin.
    ///
    /// The constant term (flat offset 0) is left out.
    pub fn bias(&self, table: &LookupTable, bins: &[usize]) -> f64 {
        self.coefficients
            .iter()
            .skip(1)
            .map(|c| c.value * table.basis(bins, &c.index))
            .sum()
    }

    /// Expansion evaluated at every bin, in flat order.
    pub fn bias_profile(&self, table: &LookupTable) -> Vec<f64> {
        self.histogram
            .iter()
            .map(|bin| self.bias(table, &bin.index))
            .collect()
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn histogram_mut(&mut self) -> &mut Histogram {
        &mut self.histogram
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut Coefficients {
        &mut self.coefficients
    }

    /// Running estimate of the unbiased visitation probability, per bin.
    pub fn unbiased(&self) -> &[f64] {
        &self.unbiased
    }

    pub fn unbiased_mut(&mut self) -> &mut [f64] {
        &mut self.unbiased
    }
}
