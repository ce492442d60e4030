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

//! Plain-text checkpoint files.
//!
//! Two files are kept in the output directory:
//!
//! - `coeff{suffix}.out`: the number of completed sweeps on the first line,
//!   followed by one coefficient per line in flat order.
//! - `basis{suffix}.out`: a header line, then one row per bin with the bin
//!   center along each axis, the negative bias, the estimated potential of mean
//!   force (`0` for unvisited bins), and the unbiased histogram. Ends with a
//!   blank line.

use super::store::{BasisStore, Coefficients};
use crate::grid::Grid;
use crate::BasisError;
use anyhow::{Context, Result};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const BASIS_HEADER: &str = "# CV values, basis set bias, PMF estimate, unbiased histogram";

/// Outcome of restoring coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientRestore {
    /// Every coefficient was read.
    Complete { sweeps: usize },
    /// Fewer coefficients than configured; the remainder keep their current values.
    ///
    /// Values are placed by flat offset. The file does not record the orders it
    /// was written with, so only a one-dimensional expansion keeps each value at
    /// its polynomial order; with several dimensions the values land at the
    /// multi-indices of the first `read` offsets of the current shape.
    Partial { sweeps: usize, read: usize },
    /// Fewer coefficients than configured and the first non-constant one is zero;
    /// all coefficients are reset.
    Fresh { sweeps: usize },
}

impl CoefficientRestore {
    pub fn sweeps(&self) -> usize {
        match self {
            Self::Complete { sweeps } | Self::Partial { sweeps, .. } | Self::Fresh { sweeps } => {
                *sweeps
            }
        }
    }
}

/// Outcome of restoring the unbiased histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbiasedRestore {
    Complete,
    /// Fewer rows than bins; remaining bins are untouched.
    Partial { read: usize },
    /// Restoring three or more dimensions is not implemented.
    Unsupported { dimension: usize },
}

/// Location of the checkpoint pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    directory: PathBuf,
    basis_suffix: String,
    coeff_suffix: String,
}

impl Checkpoint {
    pub fn new(
        directory: impl Into<PathBuf>,
        basis_suffix: impl Into<String>,
        coeff_suffix: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            basis_suffix: basis_suffix.into(),
            coeff_suffix: coeff_suffix.into(),
        }
    }

    pub fn basis_path(&self) -> PathBuf {
        self.directory.join(format!("basis{}.out", self.basis_suffix))
    }

    pub fn coeff_path(&self) -> PathBuf {
        self.directory.join(format!("coeff{}.out", self.coeff_suffix))
    }

    /// True if both files are present.
    pub fn exists(&self) -> bool {
        self.basis_path().is_file() && self.coeff_path().is_file()
    }

    /// Write both files, replacing earlier contents.
    ///
    /// `bias` is the expansion evaluated at every bin, in flat order.
    pub fn write(
        &self,
        sweeps: usize,
        grid: &dyn Grid,
        store: &BasisStore,
        bias: &[f64],
    ) -> Result<()> {
        let path = self.coeff_path();
        let mut writer = create(&path)?;
        writeln!(writer, "{}", sweeps)?;
        for value in store.coefficients().values() {
            writeln!(writer, "{}", value)?;
        }
        writer.flush()?;

        let path = self.basis_path();
        let mut writer = create(&path)?;
        writeln!(writer, "{}", BASIS_HEADER)?;
        let rows = store.histogram().iter().zip(bias).zip(store.unbiased());
        for ((bin, bias), &unbiased) in rows {
            let centers = bin
                .index
                .iter()
                .enumerate()
                .map(|(axis, &b)| grid.bin_center(axis, b))
                .join(" ");
            write!(writer, "{} {:e} ", centers, -bias)?;
            if unbiased > 0.0 {
                write!(writer, "{:e} ", -unbiased.ln())?;
            } else {
                write!(writer, "0 ")?;
            }
            writeln!(writer, "{:e}", unbiased)?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Restore the sweep count and coefficients.
    ///
    /// Reading stops at the first line that is not a number.
    pub fn read_coefficients(&self, coefficients: &mut Coefficients) -> Result<CoefficientRestore> {
        let path = self.coeff_path();
        let mut lines = open(&path)?.lines();
        let malformed = |line: usize, reason: &str| BasisError::MalformedCheckpoint {
            path: path.display().to_string(),
            line,
            reason: reason.to_string(),
        };

        let sweeps: usize = match lines.next().transpose()? {
            Some(line) => line
                .trim()
                .parse()
                .map_err(|_| malformed(1, "expected the number of completed sweeps"))?,
            None => return Err(malformed(1, "file is empty").into()),
        };

        let expected = coefficients.len();
        let mut values = Vec::with_capacity(expected);
        for line in lines {
            let Ok(value) = line?.trim().parse::<f64>() else {
                break;
            };
            if values.len() == expected {
                return Err(BasisError::TooManyCoefficients {
                    path: path.display().to_string(),
                    expected,
                }
                .into());
            }
            values.push(value);
        }

        if values.len() == expected {
            coefficients.copy_from_slice(&values);
            return Ok(CoefficientRestore::Complete { sweeps });
        }
        if values.get(1).is_some_and(|&c| c != 0.0) {
            log::warn!(
                "{} holds {} of {} coefficients; continuing with a partial restart",
                path.display(),
                values.len(),
                expected
            );
            if coefficients.shape().ndim() > 1 {
                log::warn!(
                    "{} is placed in flat order; coefficients written with other orders in {} dimensions do not keep their multi-indices",
                    path.display(),
                    coefficients.shape().ndim()
                );
            }
            for (offset, value) in values.iter().enumerate() {
                coefficients.set_value(offset, *value);
            }
            return Ok(CoefficientRestore::Partial {
                sweeps,
                read: values.len(),
            });
        }
        coefficients.fill(0.0);
        Ok(CoefficientRestore::Fresh { sweeps })
    }

    /// Restore the unbiased histogram from the last column of the basis file.
    pub fn read_unbiased(&self, dimension: usize, unbiased: &mut [f64]) -> Result<UnbiasedRestore> {
        if dimension >= 3 {
            return Ok(UnbiasedRestore::Unsupported { dimension });
        }
        let path = self.basis_path();
        let expected = unbiased.len();
        let mut read = 0;
        for (number, line) in open(&path)?.lines().enumerate().skip(1) {
            let line = line?;
            let Some(column) = line.split_whitespace().last() else {
                continue;
            };
            let value: f64 = column.parse().map_err(|_| BasisError::MalformedCheckpoint {
                path: path.display().to_string(),
                line: number + 1,
                reason: format!("cannot parse '{}' as a histogram value", column),
            })?;
            if read == expected {
                return Err(BasisError::TooManyBins {
                    path: path.display().to_string(),
                    expected,
                }
                .into());
            }
            unbiased[read] = value;
            read += 1;
        }
        if read < expected {
            log::warn!(
                "{} holds {} of {} histogram bins",
                path.display(),
                read,
                expected
            );
            return Ok(UnbiasedRestore::Partial { read });
        }
        Ok(UnbiasedRestore::Complete)
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Cannot open '{}' for writing", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))?;
    Ok(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, RegularGrid};
    use crate::legendre::LookupTable;
    use approx::assert_relative_eq;

    fn filled_store(num_bins: &[usize], orders: &[usize]) -> BasisStore {
        let mut store = BasisStore::new(num_bins, orders);
        let len = store.coefficients().len();
        for (i, c) in store.coefficients_mut().values_mut().enumerate() {
            *c = 0.1 * i as f64 - 0.37 / len as f64;
        }
        for (i, u) in store.unbiased_mut().iter_mut().enumerate() {
            *u = if i % 3 == 0 { 0.0 } else { 1.0 / (i as f64 + 1.5) };
        }
        store
    }

    fn round_trip(grid: RegularGrid, orders: &[usize]) {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "_a", "_b");
        let num_bins = grid.num_bins();
        let table = LookupTable::new(&num_bins, orders);
        let store = filled_store(&num_bins, orders);
        checkpoint
            .write(12, &grid, &store, &store.bias_profile(&table))
            .unwrap();
        assert!(checkpoint.exists());
        assert!(checkpoint.basis_path().ends_with("basis_a.out"));
        assert!(checkpoint.coeff_path().ends_with("coeff_b.out"));

        let mut restored = BasisStore::new(&num_bins, orders);
        let outcome = checkpoint
            .read_coefficients(restored.coefficients_mut())
            .unwrap();
        assert_eq!(outcome, CoefficientRestore::Complete { sweeps: 12 });
        assert_eq!(
            checkpoint
                .read_unbiased(grid.dimension(), restored.unbiased_mut())
                .unwrap(),
            UnbiasedRestore::Complete
        );
        for (a, b) in store.coefficients().values().zip(restored.coefficients().values()) {
            assert_eq!(a, b);
        }
        for (a, b) in store.unbiased().iter().zip(restored.unbiased()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn round_trip_1d() {
        round_trip(
            RegularGrid::new(vec![Axis::new(-1.0, 3.0, 7, false)]).unwrap(),
            &[3],
        );
    }

    #[test]
    fn round_trip_2d() {
        round_trip(
            RegularGrid::new(vec![
                Axis::new(-1.0, 3.0, 5, false),
                Axis::new(0.0, 6.0, 4, true),
            ])
            .unwrap(),
            &[2, 1],
        );
    }

    #[test]
    fn basis_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "", "");
        let grid = RegularGrid::new(vec![Axis::new(0.0, 2.0, 2, false)]).unwrap();
        let mut store = BasisStore::new(&[2], &[1]);
        store.unbiased_mut()[1] = 1.0;
        checkpoint.write(3, &grid, &store, &[0.0, 0.0]).unwrap();
        let content = std::fs::read_to_string(checkpoint.basis_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1].split_whitespace().collect::<Vec<_>>()[0], "0.5");
        assert_eq!(lines[1].split_whitespace().nth(2), Some("0"));
        assert_eq!(lines[2].split_whitespace().next(), Some("1.5"));
        assert!(lines[3].is_empty());
        let coeff = std::fs::read_to_string(checkpoint.coeff_path()).unwrap();
        assert_eq!(coeff.lines().collect::<Vec<_>>(), vec!["3", "0", "0"]);
    }

    #[test]
    fn excess_lines_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "", "");
        std::fs::write(checkpoint.coeff_path(), "4\n0\n0.5\n0.25\n0.1\n").unwrap();
        let mut store = BasisStore::new(&[5], &[2]);
        let error = checkpoint
            .read_coefficients(store.coefficients_mut())
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<BasisError>(),
            Some(BasisError::TooManyCoefficients { expected: 3, .. })
        ));

        std::fs::write(checkpoint.basis_path(), "# header\n0 0 0 1\n1 0 0 1\n2 0 0 1\n").unwrap();
        let mut unbiased = vec![0.0; 2];
        let error = checkpoint.read_unbiased(1, &mut unbiased).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<BasisError>(),
            Some(BasisError::TooManyBins { expected: 2, .. })
        ));
    }

    #[test]
    fn shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "", "");
        let mut store = BasisStore::new(&[5], &[3]);

        std::fs::write(checkpoint.coeff_path(), "2\n0\n0.5\n").unwrap();
        assert_eq!(
            checkpoint
                .read_coefficients(store.coefficients_mut())
                .unwrap(),
            CoefficientRestore::Partial { sweeps: 2, read: 2 }
        );
        assert_eq!(store.coefficients().value(1), 0.5);

        store.coefficients_mut().set_value(3, 9.0);
        std::fs::write(checkpoint.coeff_path(), "6\n0\n0\n").unwrap();
        assert_eq!(
            checkpoint
                .read_coefficients(store.coefficients_mut())
                .unwrap(),
            CoefficientRestore::Fresh { sweeps: 6 }
        );
        assert!(store.coefficients().values().all(|c| c == 0.0));

        std::fs::write(checkpoint.basis_path(), "# header\n0 0 0 0.5\n\n").unwrap();
        let mut unbiased = vec![0.0; 3];
        assert_eq!(
            checkpoint.read_unbiased(1, &mut unbiased).unwrap(),
            UnbiasedRestore::Partial { read: 1 }
        );
        assert_eq!(unbiased, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn partial_restart_uses_flat_order() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "", "");
        // written by an expansion with orders [1, 1]
        std::fs::write(checkpoint.coeff_path(), "4\n0\n0.1\n0.2\n0.3\n").unwrap();
        let mut store = BasisStore::new(&[4, 4], &[2, 2]);
        assert_eq!(
            checkpoint
                .read_coefficients(store.coefficients_mut())
                .unwrap(),
            CoefficientRestore::Partial { sweeps: 4, read: 4 }
        );
        let coefficients = store.coefficients();
        assert_eq!(coefficients.index(2), &[2, 0]);
        assert_eq!(coefficients.value(2), 0.2);
        assert_eq!(coefficients.index(3), &[0, 1]);
        assert_eq!(coefficients.value(3), 0.3);
        assert!(coefficients.values().skip(4).all(|c| c == 0.0));
    }

    #[test]
    fn malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path(), "", "");
        let mut store = BasisStore::new(&[5], &[1]);
        std::fs::write(checkpoint.coeff_path(), "").unwrap();
        assert!(checkpoint.read_coefficients(store.coefficients_mut()).is_err());
        std::fs::write(checkpoint.coeff_path(), "sweeps\n0\n0\n").unwrap();
        assert!(checkpoint.read_coefficients(store.coefficients_mut()).is_err());

        std::fs::write(checkpoint.basis_path(), "# header\n0 0 0 nan?\n").unwrap();
        let error = checkpoint
            .read_unbiased(1, store.unbiased_mut())
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<BasisError>(),
            Some(BasisError::MalformedCheckpoint { line: 2, .. })
        ));
    }

    #[test]
    fn three_dimensions_unsupported() {
        let checkpoint = Checkpoint::new("does-not-exist", "", "");
        let mut unbiased = vec![1.0; 8];
        assert_eq!(
            checkpoint.read_unbiased(3, &mut unbiased).unwrap(),
            UnbiasedRestore::Unsupported { dimension: 3 }
        );
        assert!(unbiased.iter().all(|&u| u == 1.0));
    }
}
