use serde::{Deserialize, Serialize};

/// Four dimensional NHWC shape. Filters reuse it as (out_channel, fh, fw, in_channel).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape4(pub [usize; 4]);

impl Shape4 {
    pub fn new(d0: usize, d1: usize, d2: usize, d3: usize) -> Self { Self([d0, d1, d2, d3]) }

    #[inline]
    pub fn dim(&self, i: usize) -> usize { self.0[i] }

    pub fn flat_size(&self) -> usize { self.0.iter().product() }

    #[inline]
    pub fn offset(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> usize {
        let [_, d1, d2, d3] = self.0;
        debug_assert!(i0 < self.0[0] && i1 < d1 && i2 < d2 && i3 < d3, "index out of range for {:?}", self.0);
        ((i0 * d1 + i1) * d2 + i2) * d3 + i3
    }

    /// Returns the shared extent of `self[a]` and `other[b]`, panicking if they differ.
    pub fn matching_dim(&self, a: usize, other: &Shape4, b: usize) -> usize {
        assert_eq!(self.0[a], other.0[b], "dimension mismatch: {:?}[{}] vs {:?}[{}]", self.0, a, other.0, b);
        self.0[a]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Tensor<'a, T> {
    pub shape: Shape4,
    pub data: &'a [T],
}

impl<'a, T> Tensor<'a, T> {
    pub fn new(shape: Shape4, data: &'a [T]) -> Self {
        assert_eq!(data.len(), shape.flat_size(), "tensor data does not match shape {:?}", shape.0);
        Self { shape, data }
    }
}

#[derive(Debug)]
pub struct TensorMut<'a, T> {
    pub shape: Shape4,
    pub data: &'a mut [T],
}

impl<'a, T> TensorMut<'a, T> {
    pub fn new(shape: Shape4, data: &'a mut [T]) -> Self {
        assert_eq!(data.len(), shape.flat_size(), "tensor data does not match shape {:?}", shape.0);
        Self { shape, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_row_major() {
        let s = Shape4::new(2, 3, 4, 5);
        assert_eq!(s.offset(0, 0, 0, 0), 0);
        assert_eq!(s.offset(0, 0, 0, 4), 4);
        assert_eq!(s.offset(0, 0, 1, 0), 5);
        assert_eq!(s.offset(0, 1, 0, 0), 20);
        assert_eq!(s.offset(1, 2, 3, 4), s.flat_size() - 1);
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn matching_dim_panics_on_mismatch() {
        let a = Shape4::new(1, 4, 4, 8);
        let b = Shape4::new(2, 4, 4, 8);
        a.matching_dim(0, &b, 0);
    }
}
