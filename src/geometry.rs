use crate::params::ConvParams;
use crate::shape::Shape4;

/// Validated dimensions of one convolution call and of its matmul lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
    pub batches: usize,
    pub input_h: usize,
    pub input_w: usize,
    pub input_depth: usize,
    pub filter_h: usize,
    pub filter_w: usize,
    pub filter_input_depth: usize,
    pub groups: usize,
    pub filters_per_group: usize,
    pub output_h: usize,
    pub output_w: usize,
    pub output_depth: usize,
    pub stride_w: usize,
    pub stride_h: usize,
    pub dilation_w: usize,
    pub dilation_h: usize,
    pub pad_w: usize,
    pub pad_h: usize,
}

impl ConvGeometry {
    pub fn new(params: &ConvParams, input: &Shape4, filter: &Shape4, output: &Shape4) -> Self {
        let batches = input.matching_dim(0, output, 0);
        let output_depth = filter.matching_dim(0, output, 3);
        let input_depth = input.dim(3);
        let filter_input_depth = filter.dim(3);
        assert!(filter_input_depth > 0, "filter input depth must be non-zero");
        assert_eq!(input_depth % filter_input_depth, 0, "input depth {input_depth} not divisible by filter depth {filter_input_depth}");
        let groups = input_depth / filter_input_depth;
        assert_eq!(output_depth % groups, 0, "output depth {output_depth} not divisible by {groups} groups");
        assert!(filter.dim(1) > 0 && filter.dim(2) > 0, "empty filter window");
        assert!(params.stride_width > 0 && params.stride_height > 0, "stride must be non-zero");
        assert!(params.dilation_width_factor > 0 && params.dilation_height_factor > 0, "dilation must be non-zero");
        Self {
            batches,
            input_h: input.dim(1),
            input_w: input.dim(2),
            input_depth,
            filter_h: filter.dim(1),
            filter_w: filter.dim(2),
            filter_input_depth,
            groups,
            filters_per_group: output_depth / groups,
            output_h: output.dim(1),
            output_w: output.dim(2),
            output_depth,
            stride_w: params.stride_width,
            stride_h: params.stride_height,
            dilation_w: params.dilation_width_factor,
            dilation_h: params.dilation_height_factor,
            pad_w: params.padding.width,
            pad_h: params.padding.height,
        }
    }

    pub fn m(&self) -> usize { self.output_h * self.output_w }

    /// Reduction length: one receptive field within a group.
    pub fn k(&self) -> usize { self.filter_h * self.filter_w * self.filter_input_depth }

    pub fn n(&self) -> usize { self.filters_per_group }

    /// Input coordinate hit by filter tap `(fy, fx)` of output `(out_y, out_x)`,
    /// or `None` when it falls in the padding.
    #[inline]
    pub fn input_coord(&self, out_y: usize, out_x: usize, fy: usize, fx: usize) -> Option<(usize, usize)> {
        let in_y = (out_y * self.stride_h + fy * self.dilation_h) as isize - self.pad_h as isize;
        let in_x = (out_x * self.stride_w + fx * self.dilation_w) as isize - self.pad_w as isize;
        let inside = in_y >= 0 && in_x >= 0 && (in_y as usize) < self.input_h && (in_x as usize) < self.input_w;
        if inside { Some((in_y as usize, in_x as usize)) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Padding;

    #[test]
    fn matmul_dims() {
        let g = ConvGeometry::new(
            &ConvParams::default(),
            &Shape4::new(1, 4, 4, 4),
            &Shape4::new(2, 3, 3, 4),
            &Shape4::new(1, 2, 2, 2),
        );
        assert_eq!((g.m(), g.k(), g.n()), (4, 36, 2));
        assert_eq!(g.groups, 1);
    }

    #[test]
    fn grouped_dims() {
        let g = ConvGeometry::new(
            &ConvParams::default(),
            &Shape4::new(1, 3, 3, 6),
            &Shape4::new(4, 1, 1, 3),
            &Shape4::new(1, 3, 3, 4),
        );
        assert_eq!((g.groups, g.filters_per_group, g.k()), (2, 2, 3));
    }

    #[test]
    fn input_coord_respects_padding() {
        let p = ConvParams { padding: Padding { width: 1, height: 1 }, ..ConvParams::default() };
        let g = ConvGeometry::new(&p, &Shape4::new(1, 3, 3, 1), &Shape4::new(1, 3, 3, 1), &Shape4::new(1, 3, 3, 1));
        assert_eq!(g.input_coord(0, 0, 0, 0), None);
        assert_eq!(g.input_coord(0, 0, 1, 1), Some((0, 0)));
        assert_eq!(g.input_coord(2, 2, 2, 2), None);
    }

    #[test]
    #[should_panic(expected = "not divisible")]
    fn rejects_uneven_depth() {
        ConvGeometry::new(&ConvParams::default(), &Shape4::new(1, 3, 3, 5), &Shape4::new(1, 1, 1, 2), &Shape4::new(1, 3, 3, 1));
    }
}
