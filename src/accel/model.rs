use std::collections::HashMap;

use super::{unpack_lane, Accelerator, Opcode, K_CHUNK, TILE};

/// Status returned for commands the unit rejects (bad column, oversize K, bad
/// read index, `Fire` without a pipeline reset since the previous `Fire`).
pub const STATUS_REJECTED: u32 = 0;

/// Behaves like the hardware: two 256-word operand buffers, a K register, an
/// offset register and a 4x4 int32 accumulator. `Fire` adds
/// `(a[r] + offset) * b[c]` over the first K columns into `acc[r][c]`.
///
/// Resets only re-arm `Fire`; K and the operand buffers survive them, so a
/// chunk is loaded, sized with `PassK`, reset and then fired. `FullReset`
/// also zeroes the accumulator.
#[derive(Clone, Debug)]
pub struct SoftCfu {
    offset: i32,
    k: usize,
    a: Vec<u32>,
    b: Vec<u32>,
    acc: [[i32; TILE]; TILE],
    pipeline_primed: bool,
    issued: HashMap<Opcode, u64>,
    macs: u64,
}

impl Default for SoftCfu {
    fn default() -> Self {
        Self {
            offset: 0,
            k: 0,
            a: vec![0; K_CHUNK],
            b: vec![0; K_CHUNK],
            acc: [[0; TILE]; TILE],
            pipeline_primed: false,
            issued: HashMap::new(),
            macs: 0,
        }
    }
}

impl SoftCfu {
    pub fn new() -> Self { Self::default() }

    pub fn offset(&self) -> i32 { self.offset }

    pub fn accumulator(&self) -> [[i32; TILE]; TILE] { self.acc }

    pub fn issued(&self, op: Opcode) -> u64 { self.issued.get(&op).copied().unwrap_or(0) }

    pub fn total_issued(&self) -> u64 { self.issued.values().sum() }

    /// Multiply-accumulates performed by `Fire` (16 per loaded column).
    pub fn macs(&self) -> u64 { self.macs }

    fn fire(&mut self) {
        for j in 0..self.k {
            let (a, b) = (self.a[j], self.b[j]);
            for r in 0..TILE {
                let x = unpack_lane(a, r) + self.offset;
                for c in 0..TILE {
                    self.acc[r][c] = self.acc[r][c].wrapping_add(x * unpack_lane(b, c));
                }
            }
        }
        self.macs += (self.k * TILE * TILE) as u64;
        self.pipeline_primed = false;
    }
}

impl Accelerator for SoftCfu {
    fn issue(&mut self, op: Opcode, arg0: u32, arg1: u32) -> u32 {
        *self.issued.entry(op).or_insert(0) += 1;
        let col = arg0 as usize;
        match op {
            Opcode::WriteA | Opcode::WriteB if col >= K_CHUNK => STATUS_REJECTED,
            Opcode::WriteA => {
                self.a[col] = arg1;
                op.code()
            }
            Opcode::WriteB => {
                self.b[col] = arg1;
                op.code()
            }
            Opcode::ReadC => {
                let (r, c) = (arg0 as usize, arg1 as usize);
                if r >= TILE || c >= TILE {
                    return STATUS_REJECTED;
                }
                self.acc[r][TILE - 1 - c] as u32
            }
            Opcode::PassK if col > K_CHUNK => STATUS_REJECTED,
            Opcode::PassK => {
                self.k = col;
                op.code()
            }
            Opcode::Fire if !self.pipeline_primed => STATUS_REJECTED,
            Opcode::Fire => {
                self.fire();
                op.code()
            }
            Opcode::PartialReset => {
                self.pipeline_primed = true;
                op.code()
            }
            Opcode::FullReset => {
                self.acc = [[0; TILE]; TILE];
                self.pipeline_primed = true;
                op.code()
            }
            Opcode::SetOffset => {
                self.offset = arg0 as i32;
                op.code()
            }
        }
    }
}
