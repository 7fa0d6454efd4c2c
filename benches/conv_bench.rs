use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tpuconv::accel::SoftCfu;
use tpuconv::{ConvLayer, ConvParams, Padding, QuantParams, ScratchArena, Shape4, Tensor, TensorMut};

fn make_tensors(input: Shape4, filter: Shape4) -> (Vec<i8>, Vec<i8>, Vec<i32>) {
    let mut seed = 0x1234_5678_9abc_def0u64;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (seed >> 40) as i8
    };
    let x = (0..input.flat_size()).map(|_| next()).collect();
    let w = (0..filter.flat_size()).map(|_| next()).collect();
    let b = (0..filter.dim(0)).map(|i| i as i32 * 37 - 200).collect();
    (x, w, b)
}

fn bench_conv(c: &mut Criterion) {
    let params = ConvParams { padding: Padding { width: 1, height: 1 }, ..ConvParams::default() };
    let input_shape = Shape4::new(1, 16, 16, 16);
    let filter_shape = Shape4::new(16, 3, 3, 16);
    let output_shape = Shape4::new(1, 16, 16, 16);
    let (x, w, b) = make_tensors(input_shape, filter_shape);
    let layer = ConvLayer::new(0, params, QuantParams::uniform(16, 1_300_000_000, -9, 128, -5));
    let mut arena = ScratchArena::new();
    let mut out = vec![0i8; output_shape.flat_size()];

    c.bench_function("conv_16x16x16_3x3_softcfu", |ben| {
        ben.iter(|| {
            let mut cfu = SoftCfu::new();
            layer
                .run(
                    &mut cfu,
                    &mut arena,
                    Tensor::new(input_shape, black_box(&x)),
                    Tensor::new(filter_shape, &w),
                    Some(&b[..]),
                    &mut TensorMut::new(output_shape, &mut out),
                )
                .unwrap();
            black_box(cfu.macs())
        })
    });

    c.bench_function("conv_16x16x16_3x3_reference", |ben| {
        ben.iter(|| {
            layer.run_reference(
                Tensor::new(input_shape, black_box(&x)),
                Tensor::new(filter_shape, &w),
                Some(&b[..]),
                &mut TensorMut::new(output_shape, &mut out),
            );
            black_box(out[0])
        })
    });
}

criterion_group!(benches, bench_conv);
criterion_main!(benches);
