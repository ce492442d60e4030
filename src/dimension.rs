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

use serde::{Deserialize, Serialize};

use crate::Point;

/// Cartesian axis onto which a vector quantity is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// X axis
    #[default]
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Dimension {
    /// Component index into a `Point`.
    pub const fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector along the axis.
    pub fn unit_vector(&self) -> Point {
        let mut unit = Point::zeros();
        unit[self.index()] = 1.0;
        unit
    }

    /// Project a point onto the axis.
    pub fn project(&self, point: &Point) -> f64 {
        point[self.index()]
    }
}
