use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tpuconv::accel::{Command, FaultInjector, Opcode, Recorder, SoftCfu};
use tpuconv::{ConvError, ConvLayer, ConvParams, Padding, ProtocolStep, QuantParams, ScratchArena, Shape4, Tensor, TensorMut};

const SENTINEL: i8 = 0x55;
const BAD_STATUS: u32 = 0xdead;

struct Fixture {
    layer: ConvLayer,
    input_shape: Shape4,
    filter_shape: Shape4,
    output_shape: Shape4,
    input: Vec<i8>,
    filter: Vec<i8>,
    bias: Vec<i32>,
}

impl Fixture {
    fn new(batches: usize) -> Self {
        let mut rng = SmallRng::seed_from_u64(0xfa17);
        let params = ConvParams { padding: Padding { width: 1, height: 1 }, ..ConvParams::default() };
        let input_shape = Shape4::new(batches, 5, 5, 8);
        let filter_shape = Shape4::new(6, 3, 3, 8);
        Self {
            layer: ConvLayer::new(3, params, QuantParams::uniform(6, 1_200_000_000, -9, 128, -4)),
            input_shape,
            filter_shape,
            output_shape: Shape4::new(batches, 5, 5, 6),
            input: (0..input_shape.flat_size()).map(|_| rng.gen()).collect(),
            filter: (0..filter_shape.flat_size()).map(|_| rng.gen()).collect(),
            bias: (0..6).map(|_| rng.gen_range(-1000..1000)).collect(),
        }
    }

    fn run<A: tpuconv::Accelerator>(&self, cfu: &mut A, out: &mut [i8]) -> Result<(), ConvError> {
        self.layer.run(
            cfu,
            &mut ScratchArena::new(),
            Tensor::new(self.input_shape, &self.input),
            Tensor::new(self.filter_shape, &self.filter),
            Some(&self.bias[..]),
            &mut TensorMut::new(self.output_shape, out),
        )
    }

    fn clean(&self) -> (Vec<i8>, Vec<Command>) {
        let mut cfu = Recorder::new(SoftCfu::new());
        let mut out = vec![SENTINEL; self.output_shape.flat_size()];
        self.run(&mut cfu, &mut out).unwrap();
        (out, cfu.commands().to_vec())
    }

    fn failing(&self, fail_at: usize) -> (ConvError, Vec<i8>, Vec<Command>) {
        let mut cfu = Recorder::new(FaultInjector::new(SoftCfu::new(), fail_at, BAD_STATUS));
        let mut out = vec![SENTINEL; self.output_shape.flat_size()];
        let err = self.run(&mut cfu, &mut out).unwrap_err();
        (err, out, cfu.commands().to_vec())
    }
}

fn step_matches(op: Opcode, step: &ProtocolStep) -> bool {
    match op {
        Opcode::SetOffset => matches!(step, ProtocolStep::SetOffset),
        Opcode::FullReset => matches!(step, ProtocolStep::FullReset { .. }),
        Opcode::WriteA => matches!(step, ProtocolStep::WriteA { .. }),
        Opcode::WriteB => matches!(step, ProtocolStep::WriteB { .. }),
        Opcode::PassK => matches!(step, ProtocolStep::PassK { .. }),
        Opcode::PartialReset => matches!(step, ProtocolStep::PartialReset { .. }),
        Opcode::Fire => matches!(step, ProtocolStep::Fire { .. }),
        Opcode::ReadC => false,
    }
}

#[test]
fn stops_at_the_first_bad_status() {
    let fx = Fixture::new(2);
    let (_, clean) = fx.clean();
    let checked: Vec<usize> = (0..clean.len()).step_by(97).filter(|&i| clean[i].op != Opcode::ReadC).collect();
    assert!(checked.len() > 10);

    for fail_at in checked {
        let (err, _, trace) = fx.failing(fail_at);
        assert_eq!(trace.len(), fail_at + 1, "commands issued after failure at {fail_at}");
        assert_eq!(trace.last().map(|c| c.ret), Some(BAD_STATUS));
        match err {
            ConvError::Protocol { layer, m, k, n, step, status } => {
                assert_eq!((layer, m, k, n, status), (3, 25, 72, 6, BAD_STATUS));
                assert!(step_matches(clean[fail_at].op, &step), "{:?} reported as {step}", clean[fail_at].op);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}

#[test]
fn offset_failure_is_reported_before_any_tile() {
    let fx = Fixture::new(1);
    let (err, out, trace) = fx.failing(0);
    assert_eq!(trace.len(), 1);
    assert!(err.is_protocol());
    assert!(matches!(err, ConvError::Protocol { step: ProtocolStep::SetOffset, .. }));
    assert!(out.iter().all(|&b| b == SENTINEL));
}

#[test]
fn failure_in_batch_one_keeps_batch_zero() {
    let fx = Fixture::new(3);
    let (clean_out, clean) = fx.clean();
    let per_batch = clean.len() / 3;
    assert_eq!(clean[per_batch].op, Opcode::SetOffset);

    // SetOffset, FullReset, then A/B pairs: the fifth WriteA of batch 1.
    let (err, out, _) = fx.failing(per_batch + 10);
    match err {
        ConvError::Protocol { step, .. } => {
            assert_eq!(step, ProtocolStep::WriteA { in_y: 0, kn_y: 0, k_base: 0, col: 4, width: 72 });
        }
        other => panic!("unexpected error {other}"),
    }
    let batch_len = fx.output_shape.flat_size() / 3;
    assert_eq!(&out[..batch_len], &clean_out[..batch_len]);
    assert!(out[batch_len..].iter().all(|&b| b == SENTINEL));
}

#[test]
fn error_names_layer_and_step() {
    let fx = Fixture::new(1);
    let (err, _, _) = fx.failing(2);
    let msg = err.to_string();
    assert!(msg.contains("layer 3"), "{msg}");
    assert!(msg.contains("writing A"), "{msg}");
    assert!(msg.contains(&BAD_STATUS.to_string()), "{msg}");
}
