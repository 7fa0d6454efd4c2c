use std::ops::AddAssign;

use super::ConvLayer;
use crate::fixed_point::{multiply_by_quantized_multiplier, multiply_by_quantized_multiplier_i64};
use crate::shape::{Tensor, TensorMut};

pub trait ConvAccum: Copy + Default + AddAssign {
    fn from_product(p: i32) -> Self;
    fn scale(self, multiplier: i32, shift: i32) -> i32;
}

impl ConvAccum for i32 {
    #[inline]
    fn from_product(p: i32) -> Self { p }
    #[inline]
    fn scale(self, multiplier: i32, shift: i32) -> i32 { multiply_by_quantized_multiplier(self, multiplier, shift) }
}

impl ConvAccum for i64 {
    #[inline]
    fn from_product(p: i32) -> Self { p as i64 }
    #[inline]
    fn scale(self, multiplier: i32, shift: i32) -> i32 { multiply_by_quantized_multiplier_i64(self, multiplier, shift) }
}

impl ConvLayer {
    /// 16x8 convolution accumulated in `B`. Int16 activations are symmetric,
    /// so neither `input_offset` nor `output_offset` is applied.
    pub fn run_i16<B: ConvAccum>(
        &self,
        input: Tensor<'_, i16>,
        filter: Tensor<'_, i8>,
        bias: Option<&[B]>,
        output: &mut TensorMut<'_, i16>,
    ) {
        let geo = self.geometry(&input.shape, &filter.shape, &output.shape, bias.map(<[B]>::len));
        let q = &self.quant;
        for batch in 0..geo.batches {
            for out_y in 0..geo.output_h {
                for out_x in 0..geo.output_w {
                    for oc in 0..geo.output_depth {
                        let group = oc / geo.filters_per_group;
                        let mut acc = B::default();
                        for fy in 0..geo.filter_h {
                            for fx in 0..geo.filter_w {
                                let Some((in_y, in_x)) = geo.input_coord(out_y, out_x, fy, fx) else { continue };
                                let in_base = input.shape.offset(batch, in_y, in_x, group * geo.filter_input_depth);
                                let f_base = filter.shape.offset(oc, fy, fx, 0);
                                for ic in 0..geo.filter_input_depth {
                                    // |i8 * i16| < 2^23, so the product fits i32.
                                    acc += B::from_product(filter.data[f_base + ic] as i32 * input.data[in_base + ic] as i32);
                                }
                            }
                        }
                        if let Some(bias) = bias {
                            acc += bias[oc];
                        }
                        let scaled = acc
                            .scale(q.output_multiplier[oc], q.output_shift[oc])
                            .clamp(q.activation_min, q.activation_max);
                        output.data[output.shape.offset(batch, out_y, out_x, oc)] = scaled as i16;
                    }
                }
            }
        }
    }
}
