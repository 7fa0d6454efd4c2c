use super::ConvLayer;
use crate::requant::requantize_one;
use crate::shape::{Tensor, TensorMut};

impl ConvLayer {
    /// Direct nested-loop int8 convolution with the same requantization as [`ConvLayer::run`].
    /// Out-of-image taps are skipped, which equals padding with `-input_offset`.
    pub fn run_reference(
        &self,
        input: Tensor<'_, i8>,
        filter: Tensor<'_, i8>,
        bias: Option<&[i32]>,
        output: &mut TensorMut<'_, i8>,
    ) {
        let geo = self.geometry(&input.shape, &filter.shape, &output.shape, bias.map(<[i32]>::len));
        let input_offset = self.quant.input_offset;
        for batch in 0..geo.batches {
            for out_y in 0..geo.output_h {
                for out_x in 0..geo.output_w {
                    for oc in 0..geo.output_depth {
                        let group = oc / geo.filters_per_group;
                        let mut acc: i32 = 0;
                        for fy in 0..geo.filter_h {
                            for fx in 0..geo.filter_w {
                                let Some((in_y, in_x)) = geo.input_coord(out_y, out_x, fy, fx) else { continue };
                                let in_base = input.shape.offset(batch, in_y, in_x, group * geo.filter_input_depth);
                                let f_base = filter.shape.offset(oc, fy, fx, 0);
                                for ic in 0..geo.filter_input_depth {
                                    let x = input.data[in_base + ic] as i32;
                                    let w = filter.data[f_base + ic] as i32;
                                    acc += w * (x + input_offset);
                                }
                            }
                        }
                        output.data[output.shape.offset(batch, out_y, out_x, oc)] = requantize_one(acc, bias, &self.quant, oc);
                    }
                }
            }
        }
    }
}
