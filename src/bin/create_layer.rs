use clap::Parser;
use std::path::PathBuf;
use tpuconv::config::{save_model, LayerSpec, ModelSpec};
use tpuconv::params::{ConvParams, Padding};
use tpuconv::shape::Shape4;

#[derive(Parser, Debug)]
#[command(name = "create-layer", version, about = "Write a sample model description for tpuconv")]
struct Args {
    /// Output path
    #[arg(long, default_value = "layers/sample.json")]
    out: PathBuf,
}

fn layer(name: &str, input: [usize; 4], filter: [usize; 4], params: ConvParams, scale: f64) -> LayerSpec {
    LayerSpec {
        name: Some(name.to_string()),
        input: Shape4(input),
        filter: Shape4(filter),
        params,
        input_offset: 128,
        output_offset: -128,
        activation_min: -128,
        activation_max: 127,
        scales: vec![scale],
        bias: true,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let same = ConvParams { padding: Padding { width: 1, height: 1 }, ..ConvParams::default() };
    let down = ConvParams { stride_width: 2, stride_height: 2, ..same };
    let model = ModelSpec {
        layers: vec![
            layer("stem", [1, 16, 16, 3], [8, 3, 3, 3], down, 0.004),
            layer("conv1", [1, 8, 8, 8], [16, 3, 3, 8], same, 0.0015),
            layer("pointwise", [1, 8, 8, 16], [10, 1, 1, 16], ConvParams::default(), 0.003),
            layer("wide_k", [1, 6, 6, 32], [6, 3, 3, 32], ConvParams::default(), 0.0007),
        ],
    };
    if let Some(dir) = args.out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    save_model(&args.out, &model)?;
    println!("Wrote {} layer(s) to {}", model.layers.len(), args.out.display());
    Ok(())
}
