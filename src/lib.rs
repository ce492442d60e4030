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

//! # Adaptive basis-function bias
//!
//! Enhanced sampling by expanding the free energy surface of a few collective
//! variables in Legendre polynomials. A visitation histogram is accumulated during
//! dynamics and periodically projected onto the basis, and the derivative of the
//! expansion is fed back to the particles as a biasing force.

use nalgebra::Vector3;

pub type Point = Vector3<f64>;
pub type PositionVec = Vec<Point>;

mod info;
pub use info::*;
mod error;
pub use error::BasisError;
pub mod basis;
pub mod collective_variable;
pub mod communicator;
pub mod dimension;
pub mod dynamics;
pub mod grid;
pub mod index;
pub mod input;
pub mod legendre;
pub mod method;
pub mod snapshot;

pub use basis::{BasisBuilder, BasisFunctionBias};
pub use method::{Method, StepOutcome};
pub use snapshot::{Snapshot, Temperature};
