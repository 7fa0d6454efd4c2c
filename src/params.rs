use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Padding {
    pub width: usize,
    pub height: usize,
}

/// Geometry of one convolution: strides, dilation and explicit padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParams {
    pub stride_width: usize,
    pub stride_height: usize,
    #[serde(default = "one")]
    pub dilation_width_factor: usize,
    #[serde(default = "one")]
    pub dilation_height_factor: usize,
    #[serde(default)]
    pub padding: Padding,
}

fn one() -> usize { 1 }

impl Default for ConvParams {
    fn default() -> Self {
        Self { stride_width: 1, stride_height: 1, dilation_width_factor: 1, dilation_height_factor: 1, padding: Padding::default() }
    }
}

impl ConvParams {
    /// Output (height, width) for an input/filter pair under this geometry.
    pub fn output_hw(&self, input_h: usize, input_w: usize, filter_h: usize, filter_w: usize) -> (usize, usize) {
        let out = |input: usize, pad: usize, dil: usize, filter: usize, stride: usize| {
            let span = dil * filter.saturating_sub(1) + 1;
            let padded = input + 2 * pad;
            if padded < span { 0 } else { (padded - span) / stride + 1 }
        };
        (
            out(input_h, self.padding.height, self.dilation_height_factor, filter_h, self.stride_height),
            out(input_w, self.padding.width, self.dilation_width_factor, filter_w, self.stride_width),
        )
    }
}

// input_offset is the negated input zero-point: the unit computes filter * (input + input_offset).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantParams {
    pub output_multiplier: Vec<i32>,
    pub output_shift: Vec<i32>,
    pub input_offset: i32,
    pub output_offset: i32,
    pub activation_min: i32,
    pub activation_max: i32,
}

impl QuantParams {
    pub fn uniform(channels: usize, multiplier: i32, shift: i32, input_offset: i32, output_offset: i32) -> Self {
        Self {
            output_multiplier: vec![multiplier; channels],
            output_shift: vec![shift; channels],
            input_offset,
            output_offset,
            activation_min: i8::MIN as i32,
            activation_max: i8::MAX as i32,
        }
    }

    pub fn channels(&self) -> usize { self.output_multiplier.len() }

    /// Value written for out-of-image taps so that `pad + input_offset == 0`.
    pub fn padding_value(&self) -> i8 { (-self.input_offset) as i8 }
}
