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

//! Continuing a run from checkpoint files.

use approx::assert_relative_eq;
use legendre_bias::{
    collective_variable::{AtomCoordinateCV, CollectiveVariable},
    communicator::SingleWalker,
    dimension::Dimension,
    grid::{Axis, RegularGrid},
    snapshot::SystemSnapshot,
    BasisBuilder, BasisError, BasisFunctionBias, Method, Point, Snapshot, Temperature,
};
use std::path::Path;

type CVs = Vec<Box<dyn CollectiveVariable>>;

fn builder(dir: &Path, orders: Vec<usize>) -> BasisBuilder {
    let mut builder = BasisBuilder::new(orders, 4);
    builder.output_dir = dir.to_path_buf();
    builder.basis_file = "_run".to_string();
    builder.coeff_file = "_run".to_string();
    builder.temperature = 2.0;
    builder
}

fn axes(dimension: usize) -> Vec<Axis> {
    (0..dimension)
        .map(|_| Axis::new(0.0, 3.0, 6, false))
        .collect()
}

fn cvs(dimension: usize) -> CVs {
    [Dimension::X, Dimension::Y, Dimension::Z]
        .into_iter()
        .take(dimension)
        .map(|d| Box::new(AtomCoordinateCV::new(0, d, 1)) as Box<dyn CollectiveVariable>)
        .collect()
}

/// Walk a particle along a fixed path for `steps` steps.
fn sample(method: &mut BasisFunctionBias, dimension: usize, steps: usize) {
    let mut snapshot = SystemSnapshot::new(vec![Point::zeros()], 0);
    let mut cvs = cvs(dimension);
    method.pre_simulation(&mut snapshot, &cvs).unwrap();
    for iteration in 1..=steps {
        let t = iteration as f64;
        snapshot.positions_mut()[0] = Point::new(
            1.5 + (0.7 * t).sin(),
            1.5 + (0.3 * t).cos(),
            1.5 + (1.1 * t).sin(),
        );
        snapshot.set_iteration(iteration);
        snapshot.clear_forces();
        cvs.iter_mut()
            .for_each(|cv| cv.update(snapshot.positions()));
        method.post_integration(&mut snapshot, &cvs).unwrap();
    }
}

fn restarted(dir: &Path, dimension: usize, orders: Vec<usize>) -> BasisFunctionBias {
    let mut builder = builder(dir, orders);
    builder.read = true;
    let mut method = builder
        .build(
            Some(Box::new(RegularGrid::new(axes(dimension)).unwrap())),
            Box::new(SingleWalker),
        )
        .unwrap();
    let mut snapshot = SystemSnapshot::new(vec![Point::zeros()], 0);
    method.pre_simulation(&mut snapshot, &cvs(dimension)).unwrap();
    method
}

fn first_run(dir: &Path, dimension: usize, orders: Vec<usize>) -> BasisFunctionBias {
    let mut method = builder(dir, orders)
        .build(
            Some(Box::new(RegularGrid::new(axes(dimension)).unwrap())),
            Box::new(SingleWalker),
        )
        .unwrap();
    sample(&mut method, dimension, 12);
    assert_eq!(method.sweeps(), 3);
    method
}

#[test]
fn restart_restores_state() {
    for (dimension, orders) in [(1, vec![3]), (2, vec![2, 3])] {
        let dir = tempfile::tempdir().unwrap();
        let original = first_run(dir.path(), dimension, orders.clone());
        assert!(original.checkpoint().basis_path().ends_with("basis_run.out"));

        let method = restarted(dir.path(), dimension, orders);
        assert_eq!(method.sweeps(), 3);
        for (a, b) in original
            .store()
            .coefficients()
            .values()
            .zip(method.store().coefficients().values())
        {
            assert_eq!(a, b);
        }
        for (a, b) in original.store().unbiased().iter().zip(method.store().unbiased()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }
}

#[test]
fn restart_continues_sweep_count() {
    let dir = tempfile::tempdir().unwrap();
    first_run(dir.path(), 1, vec![3]);
    let mut builder = builder(dir.path(), vec![3]);
    builder.read = true;
    let mut method = builder
        .build(
            Some(Box::new(RegularGrid::new(axes(1)).unwrap())),
            Box::new(SingleWalker),
        )
        .unwrap();
    sample(&mut method, 1, 8);
    assert_eq!(method.sweeps(), 5);
    let coeff = std::fs::read_to_string(method.checkpoint().coeff_path()).unwrap();
    assert_eq!(coeff.lines().next(), Some("5"));
}

#[test]
fn three_dimensions_restore_coefficients_only() {
    let dir = tempfile::tempdir().unwrap();
    let original = first_run(dir.path(), 3, vec![1, 1, 1]);
    let method = restarted(dir.path(), 3, vec![1, 1, 1]);
    assert_eq!(method.sweeps(), 3);
    for (a, b) in original
        .store()
        .coefficients()
        .values()
        .zip(method.store().coefficients().values())
    {
        assert_eq!(a, b);
    }
    assert!(method.store().unbiased().iter().all(|&u| u == 0.0));
}

#[test]
fn missing_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let method = restarted(dir.path(), 1, vec![2]);
    assert_eq!(method.sweeps(), 0);
    assert!(method.store().coefficients().values().all(|c| c == 0.0));
}

#[test]
fn larger_checkpoint_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    first_run(dir.path(), 1, vec![4]);
    let mut builder = builder(dir.path(), vec![2]);
    builder.read = true;
    let mut method = builder
        .build(
            Some(Box::new(RegularGrid::new(axes(1)).unwrap())),
            Box::new(SingleWalker),
        )
        .unwrap();
    let mut snapshot = SystemSnapshot::new(vec![Point::zeros()], 0);
    snapshot.set_temperature(1.0).unwrap();
    let error = method.pre_simulation(&mut snapshot, &cvs(1)).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<BasisError>(),
        Some(BasisError::TooManyCoefficients { expected: 3, .. })
    ));
}

#[test]
fn smaller_checkpoint_is_a_partial_restart() {
    let dir = tempfile::tempdir().unwrap();
    let original = first_run(dir.path(), 1, vec![2]);
    let method = restarted(dir.path(), 1, vec![4]);
    assert_eq!(method.sweeps(), 3);
    let coefficients: Vec<f64> = method.store().coefficients().values().collect();
    let saved: Vec<f64> = original.store().coefficients().values().collect();
    assert_eq!(&coefficients[..3], &saved[..]);
    assert_eq!(&coefficients[3..], &[0.0, 0.0]);
}
