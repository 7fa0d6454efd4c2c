use crate::error::ConvError;
use log::debug;

/// Default per-buffer element limit (2^24 - 1).
pub const DEFAULT_CAPACITY: usize = 0xff_ffff;

/// Scratch storage for the patch matrix, the flattened weights and the raw
/// accumulators, reused across calls.
///
/// Buffers grow to the largest shape requested so far and never beyond
/// `capacity` elements each; oversize requests fail before any work starts.
#[derive(Debug)]
pub struct ScratchArena {
    capacity: usize,
    patches: Vec<i8>,
    weights: Vec<i8>,
    acc: Vec<i32>,
}

/// Disjoint borrows of the three scratch buffers, each sized exactly to the request.
pub struct Scratch<'a> {
    pub patches: &'a mut [i8],
    pub weights: &'a mut [i8],
    pub acc: &'a mut [i32],
}

impl Default for ScratchArena {
    fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl ScratchArena {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, patches: Vec::new(), weights: Vec::new(), acc: Vec::new() }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn high_water(&self) -> (usize, usize, usize) { (self.patches.len(), self.weights.len(), self.acc.len()) }

    pub fn reserve(&mut self, patches: usize, weights: usize, acc: usize) -> Result<Scratch<'_>, ConvError> {
        for (what, requested) in [("patch matrix", patches), ("weight matrix", weights), ("accumulator matrix", acc)] {
            if requested > self.capacity {
                return Err(ConvError::Capacity { what, requested, capacity: self.capacity });
            }
        }
        grow(&mut self.patches, patches, "patch matrix");
        grow(&mut self.weights, weights, "weight matrix");
        grow(&mut self.acc, acc, "accumulator matrix");
        Ok(Scratch {
            patches: &mut self.patches[..patches],
            weights: &mut self.weights[..weights],
            acc: &mut self.acc[..acc],
        })
    }
}

fn grow<T: Copy + Default>(buf: &mut Vec<T>, len: usize, what: &str) {
    if buf.len() < len {
        if !buf.is_empty() {
            debug!("growing {} scratch {} -> {}", what, buf.len(), len);
        }
        buf.resize(len, T::default());
    }
}
