// im2col lowering into row-major int8 matrices

use crate::geometry::ConvGeometry;
use crate::shape::Tensor;

/// Channel group width copied as one unit when the depth allows it.
pub const LANE_BYTES: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct PackedMatrix<'a> {
    data: &'a [i8],
    rows: usize,
    cols: usize,
}

impl<'a> PackedMatrix<'a> {
    pub fn new(data: &'a [i8], rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "packed matrix {rows}x{cols} over {} bytes", data.len());
        Self { data, rows, cols }
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn as_slice(&self) -> &'a [i8] { self.data }

    #[inline]
    pub fn row(&self, r: usize) -> &'a [i8] { &self.data[r * self.cols..(r + 1) * self.cols] }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> i8 { self.data[r * self.cols + c] }

    pub fn row_block(&self, start: usize, count: usize) -> PackedMatrix<'a> {
        PackedMatrix::new(&self.data[start * self.cols..(start + count) * self.cols], count, self.cols)
    }
}

#[inline]
pub fn copy_lanes<const N: usize>(dst: &mut [i8], src: &[i8]) {
    debug_assert_eq!(dst.len(), src.len());
    debug_assert_eq!(dst.len() % N, 0);
    for (d, s) in dst.chunks_exact_mut(N).zip(src.chunks_exact(N)) {
        d.copy_from_slice(s);
    }
}

/// Fills `dst` with `value` replicated across every byte of each `N`-byte group.
#[inline]
pub fn fill_lanes<const N: usize>(dst: &mut [i8], value: i8) {
    debug_assert_eq!(dst.len() % N, 0);
    let lane = [value; N];
    for d in dst.chunks_exact_mut(N) {
        d.copy_from_slice(&lane);
    }
}

#[inline]
fn copy_channels(dst: &mut [i8], src: &[i8]) {
    if dst.len() % LANE_BYTES == 0 {
        copy_lanes::<LANE_BYTES>(dst, src);
    } else {
        for (d, s) in dst.iter_mut().zip(src) { *d = *s; }
    }
}

#[inline]
fn fill_channels(dst: &mut [i8], value: i8) {
    if dst.len() % LANE_BYTES == 0 {
        fill_lanes::<LANE_BYTES>(dst, value);
    } else {
        for d in dst.iter_mut() { *d = value; }
    }
}

/// Writes one row per output position of `batch`, columns ordered
/// `(filter_y, filter_x, channel)` over the channels of `group`. Taps that land
/// outside the image get `pad_value` on every channel.
pub fn extract_patches<'a>(
    geo: &ConvGeometry,
    input: &Tensor<'_, i8>,
    batch: usize,
    group: usize,
    pad_value: i8,
    buf: &'a mut [i8],
) -> PackedMatrix<'a> {
    let (m, k) = (geo.m(), geo.k());
    assert!(buf.len() >= m * k, "patch buffer holds {} bytes, need {}", buf.len(), m * k);
    let depth = geo.filter_input_depth;
    let ch_base = group * depth;
    let buf = &mut buf[..m * k];
    let mut taps = buf.chunks_exact_mut(depth);
    for out_y in 0..geo.output_h {
        for out_x in 0..geo.output_w {
            for fy in 0..geo.filter_h {
                for fx in 0..geo.filter_w {
                    let Some(dst) = taps.next() else { unreachable!("patch rows sized m*k") };
                    match geo.input_coord(out_y, out_x, fy, fx) {
                        Some((in_y, in_x)) => {
                            let off = input.shape.offset(batch, in_y, in_x, ch_base);
                            copy_channels(dst, &input.data[off..off + depth]);
                        }
                        None => fill_channels(dst, pad_value),
                    }
                }
            }
        }
    }
    PackedMatrix::new(buf, m, k)
}

/// Writes one row per output channel in the same column order as [`extract_patches`].
pub fn flatten_weights<'a>(geo: &ConvGeometry, filter: &Tensor<'_, i8>, buf: &'a mut [i8]) -> PackedMatrix<'a> {
    let (rows, k) = (geo.output_depth, geo.k());
    assert!(buf.len() >= rows * k, "weight buffer holds {} bytes, need {}", buf.len(), rows * k);
    let depth = geo.filter_input_depth;
    let buf = &mut buf[..rows * k];
    let mut taps = buf.chunks_exact_mut(depth);
    for oc in 0..rows {
        for fy in 0..geo.filter_h {
            for fx in 0..geo.filter_w {
                let Some(dst) = taps.next() else { unreachable!("weight rows sized n*k") };
                let off = filter.shape.offset(oc, fy, fx, 0);
                copy_channels(dst, &filter.data[off..off + depth]);
            }
        }
    }
    PackedMatrix::new(buf, rows, k)
}

/// Expands dense signed int4 values (low nibble first) into one int8 per element.
pub fn unpack_dense_int4(src: &[i8], num_elements: usize, dst: &mut [i8]) {
    assert!(src.len() * 2 >= num_elements, "int4 source too short for {num_elements} elements");
    assert!(dst.len() >= num_elements, "int4 destination too short for {num_elements} elements");
    for i in 0..num_elements / 2 {
        let byte = src[i];
        dst[2 * i] = (byte << 4) >> 4;
        dst[2 * i + 1] = byte >> 4;
    }
    if num_elements % 2 != 0 {
        dst[num_elements - 1] = (src[num_elements / 2] << 4) >> 4;
    }
}
