use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::conv::ConvLayer;
use crate::fixed_point::quantize_multiplier;
use crate::params::{ConvParams, QuantParams};
use crate::shape::Shape4;

/// One convolution as described on disk. Quantization is given as real
/// per-channel scales (`input_scale * filter_scale / output_scale`); a single
/// entry applies to every channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub input: Shape4,
    pub filter: Shape4,
    #[serde(default)]
    pub params: ConvParams,
    #[serde(default = "default_input_offset")]
    pub input_offset: i32,
    #[serde(default)]
    pub output_offset: i32,
    #[serde(default = "default_activation_min")]
    pub activation_min: i32,
    #[serde(default = "default_activation_max")]
    pub activation_max: i32,
    pub scales: Vec<f64>,
    #[serde(default)]
    pub bias: bool,
}

fn default_input_offset() -> i32 { 128 }
fn default_activation_min() -> i32 { i8::MIN as i32 }
fn default_activation_max() -> i32 { i8::MAX as i32 }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub layers: Vec<LayerSpec>,
}

impl LayerSpec {
    pub fn output_shape(&self) -> Shape4 {
        let (h, w) = self.params.output_hw(self.input.dim(1), self.input.dim(2), self.filter.dim(1), self.filter.dim(2));
        Shape4::new(self.input.dim(0), h, w, self.filter.dim(0))
    }

    pub fn to_layer(&self, index: usize) -> Result<ConvLayer> {
        let label = self.name.clone().unwrap_or_else(|| format!("#{index}"));
        let channels = self.filter.dim(0);
        let (fid, depth) = (self.filter.dim(3), self.input.dim(3));
        if fid == 0 || depth % fid != 0 {
            bail!("layer {label}: input depth {depth} is not a multiple of filter depth {fid}");
        }
        if channels % (depth / fid) != 0 {
            bail!("layer {label}: {channels} filters do not split into {} groups", depth / fid);
        }
        if !(-127..=128).contains(&self.input_offset) {
            bail!("layer {label}: input offset {} is outside -127..=128", self.input_offset);
        }
        if self.activation_min > self.activation_max {
            bail!("layer {label}: empty activation range {}..={}", self.activation_min, self.activation_max);
        }
        let scales: Vec<f64> = match self.scales.len() {
            1 => vec![self.scales[0]; channels],
            n if n == channels => self.scales.clone(),
            n => bail!("layer {label}: {n} scales for {channels} output channels"),
        };
        let mut quant = QuantParams::uniform(channels, 0, 0, self.input_offset, self.output_offset);
        quant.activation_min = self.activation_min;
        quant.activation_max = self.activation_max;
        for (c, &s) in scales.iter().enumerate() {
            if !(s >= 0.0 && s.is_finite()) {
                bail!("layer {label}: channel {c} scale {s} is not a finite non-negative number");
            }
            let (m, shift) = quantize_multiplier(s);
            if !(-31..=7).contains(&shift) {
                bail!("layer {label}: channel {c} scale {s} needs shift {shift}, outside -31..=7");
            }
            quant.output_multiplier[c] = m;
            quant.output_shift[c] = shift;
        }
        Ok(ConvLayer::new(index, self.params, quant))
    }
}

/// Reads either a `{"layers": [...]}` model or a single layer object.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelSpec> {
    let f = File::open(&path).with_context(|| format!("open layer file: {}", path.as_ref().display()))?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(f)).context("parse layer json")?;
    if value.get("layers").is_some() {
        serde_json::from_value(value).context("decode model")
    } else {
        let layer: LayerSpec = serde_json::from_value(value).context("decode layer")?;
        Ok(ModelSpec { layers: vec![layer] })
    }
}

pub fn save_model<P: AsRef<Path>>(path: P, model: &ModelSpec) -> Result<()> {
    let f = File::create(&path).with_context(|| format!("create layer file: {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), model).context("write model json")
}

#[derive(Clone, Debug)]
pub struct LayerData {
    pub input: Vec<i8>,
    pub filter: Vec<i8>,
    pub bias: Option<Vec<i32>>,
}

impl LayerData {
    pub fn random(spec: &LayerSpec, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let input = (0..spec.input.flat_size()).map(|_| rng.gen::<i8>()).collect();
        let filter = (0..spec.filter.flat_size()).map(|_| rng.gen::<i8>()).collect();
        let bias = spec.bias.then(|| (0..spec.filter.dim(0)).map(|_| rng.gen_range(-4096..4096)).collect());
        Self { input, filter, bias }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LayerSpec {
        serde_json::from_str(r#"{"input":[1,5,5,8],"filter":[6,3,3,8],"scales":[0.002]}"#).unwrap()
    }

    #[test]
    fn defaults_fill_in() {
        let s = spec();
        assert_eq!(s.input_offset, 128);
        assert_eq!((s.activation_min, s.activation_max), (-128, 127));
        assert_eq!(s.params, ConvParams::default());
        assert_eq!(s.output_shape(), Shape4::new(1, 3, 3, 6));
    }

    #[test]
    fn single_scale_broadcasts() {
        let layer = spec().to_layer(3).unwrap();
        assert_eq!(layer.index, 3);
        assert_eq!(layer.quant.channels(), 6);
        assert!(layer.quant.output_multiplier.iter().all(|&m| m == layer.quant.output_multiplier[0]));
    }

    #[test]
    fn rejects_wrong_scale_count() {
        let mut s = spec();
        s.scales = vec![0.1, 0.2];
        assert!(s.to_layer(0).is_err());
    }

    #[test]
    fn random_data_is_seeded() {
        let s = spec();
        let a = LayerData::random(&s, 7);
        let b = LayerData::random(&s, 7);
        assert_eq!(a.input, b.input);
        assert_eq!(a.filter.len(), 6 * 3 * 3 * 8);
        assert!(a.bias.is_none());
    }
}
