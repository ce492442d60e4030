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

//! Mixed-radix multi-indices.
//!
//! Two tensors share the same index arithmetic: the visitation histogram lives in
//! *bin space* (one radix per grid axis, the number of bins) while the expansion
//! coefficients live in *order space* (one radix per axis, the maximum polynomial
//! order plus one). In both, the first axis varies fastest, so the flat offset of
//! `[i0, i1, i2]` is `i0 + n0 * (i1 + n1 * i2)`.

use std::marker::PhantomData;

/// Radices of a mixed-radix number system where the first axis varies fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    radices: Vec<usize>,
    strides: Vec<usize>,
}

impl Shape {
    pub fn new(radices: Vec<usize>) -> Self {
        let strides = radices
            .iter()
            .scan(1, |weight, &radix| {
                let stride = *weight;
                *weight *= radix;
                Some(stride)
            })
            .collect();
        Self { radices, strides }
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.radices.len()
    }

    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    /// Total number of multi-indices, i.e. the product of all radices.
    pub fn len(&self) -> usize {
        self.radices.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat offset of a multi-index.
    pub fn flatten(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.ndim());
        index.iter().zip(&self.strides).map(|(i, s)| i * s).sum()
    }

    /// Multi-index of a flat offset.
    pub fn unflatten(&self, mut offset: usize) -> Vec<usize> {
        self.radices
            .iter()
            .map(|&radix| {
                let i = offset % radix;
                offset /= radix;
                i
            })
            .collect()
    }

    /// All multi-indices in flat-offset order.
    pub fn indices(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.len()).map(|offset| self.unflatten(offset))
    }
}

/// Marker for the space a tensor is defined over.
pub trait Population: std::fmt::Debug + Clone {
    const NAME: &'static str;
}

/// Grid bins; one radix per axis equal to the number of bins.
#[derive(Debug, Clone, Copy)]
pub struct BinSpace;

impl Population for BinSpace {
    const NAME: &'static str = "bin";
}

/// Polynomial orders; one radix per axis equal to the maximum order plus one.
#[derive(Debug, Clone, Copy)]
pub struct OrderSpace;

impl Population for OrderSpace {
    const NAME: &'static str = "order";
}

/// A multi-index paired with a scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedScalar {
    pub index: Vec<usize>,
    pub value: f64,
}

/// Dense tensor of [`IndexedScalar`] entries enumerated in mixed-radix order.
///
/// The number of entries is fixed at construction.
#[derive(Debug, Clone)]
pub struct IndexedTensor<P: Population> {
    shape: Shape,
    entries: Vec<IndexedScalar>,
    _population: PhantomData<P>,
}

impl<P: Population> IndexedTensor<P> {
    /// Tensor of zeros with one entry per multi-index of `shape`.
    pub fn zeros(shape: Shape) -> Self {
        let entries = shape
            .indices()
            .map(|index| IndexedScalar { index, value: 0.0 })
            .collect();
        Self {
            shape,
            entries,
            _population: PhantomData,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedScalar] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedScalar> {
        self.entries.iter()
    }

    /// Multi-index at flat offset.
    pub fn index(&self, offset: usize) -> &[usize] {
        &self.entries[offset].index
    }

    pub fn value(&self, offset: usize) -> f64 {
        self.entries[offset].value
    }

    pub fn set_value(&mut self, offset: usize, value: f64) {
        self.entries[offset].value = value;
    }

    pub fn add_value(&mut self, offset: usize, value: f64) {
        self.entries[offset].value += value;
    }

    /// Values in flat-offset order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.entries.iter_mut().map(|entry| &mut entry.value)
    }

    pub fn fill(&mut self, value: f64) {
        self.values_mut().for_each(|v| *v = value);
    }

    /// Copy values into a flat buffer of equal length.
    pub fn copy_to_slice(&self, buffer: &mut [f64]) {
        assert_eq!(buffer.len(), self.len(), "{} tensor length", P::NAME);
        buffer
            .iter_mut()
            .zip(self.values())
            .for_each(|(b, v)| *b = v);
    }

    /// Overwrite values from a flat buffer of equal length.
    pub fn copy_from_slice(&mut self, buffer: &[f64]) {
        assert_eq!(buffer.len(), self.len(), "{} tensor length", P::NAME);
        self.values_mut()
            .zip(buffer)
            .for_each(|(v, &b)| *v = b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_axis_varies_fastest() {
        let shape = Shape::new(vec![3, 2]);
        let indices: Vec<_> = shape.indices().collect();
        assert_eq!(
            indices,
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![2, 0],
                vec![0, 1],
                vec![1, 1],
                vec![2, 1]
            ]
        );
        assert_eq!(shape.flatten(&[2, 1]), 5);
        assert_eq!(shape.flatten(&[1, 1]), 4);
    }

    #[test]
    fn flatten_is_bijective() {
        for radices in [vec![10], vec![4, 3], vec![3, 5, 2], vec![7, 1, 4], vec![2, 2, 2, 2]] {
            let shape = Shape::new(radices);
            let mut seen = vec![false; shape.len()];
            for offset in 0..shape.len() {
                let index = shape.unflatten(offset);
                assert!(index.iter().zip(shape.radices()).all(|(i, r)| i < r));
                assert_eq!(shape.flatten(&index), offset);
                seen[offset] = true;
            }
            assert!(seen.into_iter().all(|s| s));
        }
    }

    #[test]
    fn unequal_radices_use_products() {
        // a flat offset built from powers of the local radix would collide here
        let shape = Shape::new(vec![4, 3]);
        assert_eq!(shape.flatten(&[0, 1]), 4);
        assert_eq!(shape.flatten(&[3, 2]), 11);
        assert_eq!(shape.len(), 12);
    }

    #[test]
    fn tensor_entries_follow_shape() {
        let tensor = IndexedTensor::<OrderSpace>::zeros(Shape::new(vec![3, 3]));
        assert_eq!(tensor.len(), 9);
        for (offset, entry) in tensor.iter().enumerate() {
            assert_eq!(tensor.shape().flatten(&entry.index), offset);
            assert_eq!(entry.value, 0.0);
        }
        assert_eq!(tensor.index(0), &[0, 0]);
    }

    #[test]
    fn tensor_buffers() {
        let mut tensor = IndexedTensor::<BinSpace>::zeros(Shape::new(vec![2, 2]));
        tensor.add_value(3, 2.0);
        tensor.add_value(3, 1.0);
        let mut buffer = vec![0.0; 4];
        tensor.copy_to_slice(&mut buffer);
        assert_eq!(buffer, vec![0.0, 0.0, 0.0, 3.0]);
        tensor.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(tensor.values().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);
        tensor.fill(0.0);
        assert_eq!(tensor.values().sum::<f64>(), 0.0);
    }
}
