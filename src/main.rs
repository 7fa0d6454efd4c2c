use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use tpuconv::accel::{FaultInjector, Opcode, SoftCfu};
use tpuconv::arena::{ScratchArena, DEFAULT_CAPACITY};
use tpuconv::config::{load_model, LayerData};
use tpuconv::shape::{Tensor, TensorMut};

#[derive(Parser, Debug)]
#[command(name = "tpuconv", version, about = "Run quantized conv layers on the software matmul unit and check them against the reference loops")]
struct Args {
    /// Layer or model description (JSON)
    #[arg(long)]
    layer: PathBuf,

    /// Seed for the synthetic input/filter/bias tensors
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Scratch capacity per buffer, in elements
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Corrupt the status of the n-th command of every layer (0-based)
    #[arg(long)]
    fail_at: Option<usize>,

    /// Print the per-opcode command counts for every layer
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let model = load_model(&args.layer)?;
    info!("loaded {} layer(s) from {}", model.layers.len(), args.layer.display());

    let pb = ProgressBar::new(model.layers.len() as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    let mut arena = ScratchArena::with_capacity(args.capacity);
    let mut failed = 0usize;
    let t0 = Instant::now();

    for (i, spec) in model.layers.iter().enumerate() {
        let layer = spec.to_layer(i)?;
        let data = LayerData::random(spec, args.seed.wrapping_add(i as u64));
        let out_shape = spec.output_shape();
        let input = Tensor::new(spec.input, &data.input);
        let filter = Tensor::new(spec.filter, &data.filter);
        let bias = data.bias.as_deref();
        pb.set_message(spec.name.clone().unwrap_or_else(|| format!("layer {i}")));

        let mut hw = vec![0i8; out_shape.flat_size()];
        let mut cfu = SoftCfu::new();
        let res = {
            let mut out = TensorMut::new(out_shape, &mut hw);
            match args.fail_at {
                Some(n) => layer.run(&mut FaultInjector::new(&mut cfu, n, 0xdead), &mut arena, input, filter, bias, &mut out),
                None => layer.run(&mut cfu, &mut arena, input, filter, bias, &mut out),
            }
        };
        if let Err(e) = res {
            pb.println(format!("layer {i}: {e}"));
            failed += 1;
            pb.inc(1);
            continue;
        }

        let mut sw = vec![0i8; out_shape.flat_size()];
        layer.run_reference(input, filter, bias, &mut TensorMut::new(out_shape, &mut sw));
        let diff = hw.iter().zip(&sw).filter(|(a, b)| a != b).count();
        if diff > 0 {
            pb.println(format!("layer {i}: {diff}/{} outputs differ from reference", sw.len()));
            failed += 1;
        }
        if args.stats {
            let counts: Vec<String> = Opcode::ALL.iter().map(|&op| format!("{:?}={}", op, cfu.issued(op))).collect();
            pb.println(format!("layer {i}: shape={:?} macs={} {}", out_shape.0, cfu.macs(), counts.join(" ")));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let (p, w, a) = arena.high_water();
    println!(
        "layers={} failed={} elapsed={:.3}s scratch(patches={} weights={} acc={})",
        model.layers.len(), failed, t0.elapsed().as_secs_f64(), p, w, a
    );
    if failed > 0 {
        bail!("{failed} layer(s) failed");
    }
    Ok(())
}
