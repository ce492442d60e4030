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

//! Tabulated Legendre polynomials at bin centers.
//!
//! Each grid axis is mapped onto `[-1, 1]` and the polynomials `P_j` and their
//! derivatives are evaluated once at the `n` bin centers `x_i = 2(i + ½)/n - 1`
//! using Bonnet's recursion
//!
//! ```text
//! j P_j(x)  = (2j - 1) x P_{j-1}(x) - (j - 1) P_{j-2}(x)
//! j P'_j(x) = (2j - 1) (P_{j-1}(x) + x P'_{j-1}(x)) - (j - 1) P'_{j-2}(x)
//! ```

use ndarray::Array2;

/// Legendre polynomials of one axis, tabulated at every bin center.
///
/// Rows are polynomial orders and columns are bins, so the row-major storage
/// places order `j` at bin `i` at flat offset `i + j * n`.
#[derive(Debug, Clone)]
pub struct LegendreTable {
    values: Array2<f64>,
    derivatives: Array2<f64>,
}

impl LegendreTable {
    /// Tabulate orders `0..=order` at `num_bins` bin centers.
    pub fn new(num_bins: usize, order: usize) -> Self {
        let x: Vec<f64> = Self::nodes(num_bins).collect();
        let mut values = Array2::zeros((order + 1, num_bins));
        let mut derivatives = Array2::zeros((order + 1, num_bins));

        values.row_mut(0).fill(1.0);
        if order >= 1 {
            values.row_mut(1).assign(&ndarray::ArrayView1::from(x.as_slice()));
            derivatives.row_mut(1).fill(1.0);
        }
        for j in 2..=order {
            let a = (2 * j - 1) as f64;
            let b = (j - 1) as f64;
            let c = j as f64;
            for (i, &xi) in x.iter().enumerate() {
                values[[j, i]] = (a * xi * values[[j - 1, i]] - b * values[[j - 2, i]]) / c;
                derivatives[[j, i]] = (a * (values[[j - 1, i]] + xi * derivatives[[j - 1, i]])
                    - b * derivatives[[j - 2, i]])
                    / c;
            }
        }
        Self {
            values,
            derivatives,
        }
    }

    /// Bin centers mapped onto `[-1, 1]`.
    pub fn nodes(num_bins: usize) -> impl Iterator<Item = f64> {
        (0..num_bins).map(move |i| 2.0 * (i as f64 + 0.5) / num_bins as f64 - 1.0)
    }

    pub fn num_bins(&self) -> usize {
        self.values.ncols()
    }

    /// Highest tabulated order.
    pub fn order(&self) -> usize {
        self.values.nrows() - 1
    }

    /// `P_order` at the center of `bin`.
    pub fn value(&self, bin: usize, order: usize) -> f64 {
        self.values[[order, bin]]
    }

    /// `dP_order/dx` at the center of `bin`, with `x` on `[-1, 1]`.
    pub fn derivative(&self, bin: usize, order: usize) -> f64 {
        self.derivatives[[order, bin]]
    }
}

/// Legendre tables for all axes of a grid.
#[derive(Debug, Clone)]
pub struct LookupTable {
    axes: Vec<LegendreTable>,
}

impl LookupTable {
    /// One table per axis; `num_bins` and `orders` must have equal length.
    pub fn new(num_bins: &[usize], orders: &[usize]) -> Self {
        assert_eq!(num_bins.len(), orders.len());
        let axes = num_bins
            .iter()
            .zip(orders)
            .map(|(&n, &order)| LegendreTable::new(n, order))
            .collect();
        Self { axes }
    }

    pub fn axis(&self, dimension: usize) -> &LegendreTable {
        &self.axes[dimension]
    }

    /// Product basis function `Π_d P_{orders[d]}(x_{bins[d]})`.
    pub fn basis(&self, bins: &[usize], orders: &[usize]) -> f64 {
        self.axes
            .iter()
            .zip(bins.iter().zip(orders))
            .map(|(table, (&bin, &order))| table.value(bin, order))
            .product()
    }

    /// Partial derivative of the product basis along `dimension`, in units of the
    /// reduced coordinate. Multiply by `2 / (upper - lower)` for grid units.
    pub fn basis_derivative(&self, bins: &[usize], orders: &[usize], dimension: usize) -> f64 {
        self.axes
            .iter()
            .zip(bins.iter().zip(orders))
            .enumerate()
            .map(|(d, (table, (&bin, &order)))| {
                if d == dimension {
                    table.derivative(bin, order)
                } else {
                    table.value(bin, order)
                }
            })
            .product()
    }
}
