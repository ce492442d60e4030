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

use derive_more::{Display, Error};

/// Fatal conditions of the basis-function bias.
///
/// These are returned wrapped in `anyhow::Error`. A driver running several
/// cooperating walkers must treat any of them as a signal to shut down every
/// walker, which is why configuration errors are also broadcast through
/// [`Communicator::abort`](crate::communicator::Communicator::abort).
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum BasisError {
    /// No grid was given for a method that bins collective variable space.
    #[display("method expected a grid but no grid was built")]
    MissingGrid,
    /// Grid and collective variables disagree on the dimension.
    #[display("grid has {grid} dimension(s) but {cvs} collective variable(s) were given")]
    DimensionMismatch { grid: usize, cvs: usize },
    /// Neither the system nor the input defines a temperature.
    #[display("temperature is undefined; declare a fallback `temperature` for this system")]
    UndefinedTemperature,
    /// The coefficient checkpoint holds more values than the configured expansion.
    #[display("{path} has more than the {expected} requested coefficients")]
    TooManyCoefficients { path: String, expected: usize },
    /// The histogram checkpoint holds more rows than there are bins.
    #[display("{path} has more than the {expected} requested histogram bins")]
    TooManyBins { path: String, expected: usize },
    /// A checkpoint line could not be parsed.
    #[display("{path}:{line}: {reason}")]
    MalformedCheckpoint {
        path: String,
        line: usize,
        reason: String,
    },
    /// Another walker hit a fatal error and aborted the group.
    #[display("run aborted by a cooperating walker: {reason}")]
    Aborted { reason: String },
}
