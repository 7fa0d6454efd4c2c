pub mod fallback;
pub mod reference;

use log::debug;
use serde::{Deserialize, Serialize};

pub use fallback::ConvAccum;

use crate::accel::{Accelerator, AcceleratorSession};
use crate::arena::{Scratch, ScratchArena};
use crate::error::ConvError;
use crate::geometry::ConvGeometry;
use crate::pack::{extract_patches, flatten_weights, unpack_dense_int4};
use crate::params::{ConvParams, QuantParams};
use crate::requant::requantize;
use crate::shape::{Shape4, Tensor, TensorMut};

/// One convolution layer: geometry, requantization and its index in the model.
///
/// `index` only feeds diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvLayer {
    #[serde(default)]
    pub index: usize,
    pub params: ConvParams,
    pub quant: QuantParams,
}

impl ConvLayer {
    pub fn new(index: usize, params: ConvParams, quant: QuantParams) -> Self { Self { index, params, quant } }

    pub(crate) fn geometry(&self, input: &Shape4, filter: &Shape4, output: &Shape4, bias_len: Option<usize>) -> ConvGeometry {
        let geo = ConvGeometry::new(&self.params, input, filter, output);
        let q = &self.quant;
        assert!(q.activation_min <= q.activation_max, "activation range {}..={} is empty", q.activation_min, q.activation_max);
        assert_eq!(q.output_multiplier.len(), geo.output_depth, "one multiplier per output channel");
        assert_eq!(q.output_shift.len(), geo.output_depth, "one shift per output channel");
        if let Some(len) = bias_len {
            assert_eq!(len, geo.output_depth, "one bias per output channel");
        }
        geo
    }

    /// Int8 convolution with the multiply-accumulate work on `cfu`.
    ///
    /// Batch elements are processed in order. On a protocol failure the
    /// error is returned at once: earlier batch elements are complete, the
    /// failing one and everything after it are left as they were.
    pub fn run<A: Accelerator>(
        &self,
        cfu: &mut A,
        arena: &mut ScratchArena,
        input: Tensor<'_, i8>,
        filter: Tensor<'_, i8>,
        bias: Option<&[i32]>,
        output: &mut TensorMut<'_, i8>,
    ) -> Result<(), ConvError> {
        let geo = self.geometry(&input.shape, &filter.shape, &output.shape, bias.map(<[i32]>::len));
        assert!(
            (-127..=128).contains(&self.quant.input_offset),
            "input offset {} has no int8 padding value",
            self.quant.input_offset
        );
        let (m, k, n) = (geo.m(), geo.k(), geo.n());
        if m == 0 || n == 0 {
            return Ok(());
        }
        debug!(
            "layer {}: conv {}x{}x{} groups={} batches={}",
            self.index, m, k, n, geo.groups, geo.batches
        );

        let Scratch { patches, weights, acc } = arena.reserve(m * k, geo.output_depth * k, geo.groups * m * n)?;
        let weights = flatten_weights(&geo, &filter, weights);
        let pad = self.quant.padding_value();

        for batch in 0..geo.batches {
            let mut session = AcceleratorSession::open(&mut *cfu, self.index, m, k, n, self.quant.input_offset)?;
            for (group, block) in acc.chunks_exact_mut(m * n).enumerate() {
                let lhs = extract_patches(&geo, &input, batch, group, pad, &mut *patches);
                let rhs = weights.row_block(group * n, n);
                session.matmul(&lhs, &rhs, block)?;
            }
            for (group, block) in acc.chunks_exact(m * n).enumerate() {
                requantize(&geo, block, bias, &self.quant, batch, group, output);
            }
        }
        Ok(())
    }

    /// [`ConvLayer::run`] over dense int4 weights, unpacked into `unpacked` first.
    #[allow(clippy::too_many_arguments)]
    pub fn run_packed_int4<A: Accelerator>(
        &self,
        cfu: &mut A,
        arena: &mut ScratchArena,
        input: Tensor<'_, i8>,
        filter_shape: Shape4,
        packed: &[i8],
        unpacked: &mut [i8],
        bias: Option<&[i32]>,
        output: &mut TensorMut<'_, i8>,
    ) -> Result<(), ConvError> {
        let len = filter_shape.flat_size();
        unpack_dense_int4(packed, len, unpacked);
        let filter = Tensor::new(filter_shape, &unpacked[..len]);
        self.run(cfu, arena, input, filter, bias, output)
    }
}
