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

//! # Interface between a simulation driver and a sampling method

use crate::collective_variable::CVList;
use crate::{Info, Snapshot};
use anyhow::Result;
use core::fmt::Debug;

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepOutcome {
    /// Keep integrating.
    #[default]
    Continue,
    /// The method is done, e.g. because the bias has converged. Finish the run.
    Stop,
}

/// Hooks called by the simulation driver.
///
/// The driver calls `pre_simulation` once, `post_integration` after every
/// integration step, and `post_simulation` once at the end. Collective variables
/// are updated by the driver before each call.
pub trait Method<S: Snapshot>: Debug + Info {
    /// Build internal state and optionally restore it from disk.
    fn pre_simulation(&mut self, snapshot: &mut S, cvs: &CVList) -> Result<()>;

    /// Collect statistics and add bias forces to the snapshot.
    fn post_integration(&mut self, snapshot: &mut S, cvs: &CVList) -> Result<StepOutcome>;

    /// Called once after the last step.
    fn post_simulation(&mut self, _snapshot: &mut S, _cvs: &CVList) -> Result<()> {
        Ok(())
    }

    /// Report method state as a YAML value
    fn to_yaml(&self) -> Option<serde_yaml::Value> {
        None
    }
}
