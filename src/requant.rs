use crate::fixed_point::multiply_by_quantized_multiplier;
use crate::geometry::ConvGeometry;
use crate::params::QuantParams;
use crate::shape::TensorMut;

#[inline]
pub fn requantize_one(acc: i32, bias: Option<&[i32]>, quant: &QuantParams, channel: usize) -> i8 {
    let mut acc = acc;
    if let Some(bias) = bias {
        acc = acc.wrapping_add(bias[channel]);
    }
    acc = multiply_by_quantized_multiplier(acc, quant.output_multiplier[channel], quant.output_shift[channel]);
    acc = acc.saturating_add(quant.output_offset);
    acc.clamp(quant.activation_min, quant.activation_max) as i8
}

/// Writes the `m x n` accumulator block of `group` into `output[batch]`.
///
/// Row `r` of `raw` is output position `(r / output_w, r % output_w)`; column
/// `c` is output channel `group * filters_per_group + c`.
pub fn requantize(
    geo: &ConvGeometry,
    raw: &[i32],
    bias: Option<&[i32]>,
    quant: &QuantParams,
    batch: usize,
    group: usize,
    output: &mut TensorMut<'_, i8>,
) {
    let n = geo.n();
    assert_eq!(raw.len(), geo.m() * n, "accumulator block shape");
    let ch_base = group * n;
    let mut rows = raw.chunks_exact(n.max(1));
    for out_y in 0..geo.output_h {
        for out_x in 0..geo.output_w {
            let Some(row) = rows.next() else { return };
            let base = output.shape.offset(batch, out_y, out_x, ch_base);
            for (c, &acc) in row.iter().enumerate() {
                output.data[base + c] = requantize_one(acc, bias, quant, ch_base + c);
            }
        }
    }
}
