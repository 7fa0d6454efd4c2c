use log::{debug, error, trace};

use super::{pack_word, Accelerator, Opcode, K_CHUNK, TILE};
use crate::error::{ConvError, ProtocolStep};
use crate::pack::PackedMatrix;

/// Protocol state for one batch element. Nothing is issued after a bad status.
pub struct AcceleratorSession<'c, A: Accelerator> {
    cfu: &'c mut A,
    layer: usize,
    m: usize,
    k: usize,
    n: usize,
    tile: (usize, usize),
    k_base: usize,
}

impl<'c, A: Accelerator> AcceleratorSession<'c, A> {
    pub fn open(cfu: &'c mut A, layer: usize, m: usize, k: usize, n: usize, input_offset: i32) -> Result<Self, ConvError> {
        let mut session = Self { cfu, layer, m, k, n, tile: (0, 0), k_base: 0 };
        debug!("layer {}: session {}x{}x{} offset {}", layer, m, k, n, input_offset);
        session.command(Opcode::SetOffset, input_offset as u32, 0, ProtocolStep::SetOffset)?;
        Ok(session)
    }

    pub fn dims(&self) -> (usize, usize, usize) { (self.m, self.k, self.n) }

    pub fn position(&self) -> ((usize, usize), usize) { (self.tile, self.k_base) }

    /// Computes `raw = lhs * rhs^T` one 4x4 tile at a time. `lhs` is `m x k`,
    /// `rhs` is `n x k`, `raw` is `m x n` row-major.
    pub fn matmul(&mut self, lhs: &PackedMatrix<'_>, rhs: &PackedMatrix<'_>, raw: &mut [i32]) -> Result<(), ConvError> {
        let (m, k, n) = (self.m, self.k, self.n);
        assert_eq!((lhs.rows(), lhs.cols()), (m, k), "lhs shape");
        assert_eq!((rhs.rows(), rhs.cols()), (n, k), "rhs shape");
        assert_eq!(raw.len(), m * n, "accumulator shape");

        for in_y in (0..m).step_by(TILE) {
            let a_rows = in_y..(in_y + TILE).min(m);
            for kn_y in (0..n).step_by(TILE) {
                let b_rows = kn_y..(kn_y + TILE).min(n);
                self.tile = (in_y, kn_y);
                self.k_base = 0;
                self.command(Opcode::FullReset, 0, 0, ProtocolStep::FullReset { in_y, kn_y })?;

                for k_base in (0..k).step_by(K_CHUNK) {
                    self.k_base = k_base;
                    let width = (k - k_base).min(K_CHUNK);
                    for col in 0..width {
                        let c = k_base + col;
                        let a = pack_word(a_rows.clone().map(|r| lhs.get(r, c)));
                        self.command(Opcode::WriteA, col as u32, a, ProtocolStep::WriteA { in_y, kn_y, k_base, col, width })?;
                        let b = pack_word(b_rows.clone().map(|r| rhs.get(r, c)));
                        self.command(Opcode::WriteB, col as u32, b, ProtocolStep::WriteB { in_y, kn_y, k_base, col, width })?;
                    }
                    self.command(Opcode::PassK, width as u32, 0, ProtocolStep::PassK { in_y, kn_y, k_base, width })?;
                    self.command(Opcode::PartialReset, 0, 0, ProtocolStep::PartialReset { in_y, kn_y, k_base })?;
                    self.command(Opcode::Fire, 0, 0, ProtocolStep::Fire { in_y, kn_y, k_base })?;
                }

                trace!("layer {}: tile ({}, {}) accumulated", self.layer, in_y, kn_y);
                for i in 0..a_rows.len() {
                    for j in 0..b_rows.len() {
                        let val = self.cfu.issue(Opcode::ReadC, i as u32, (TILE - 1 - j) as u32);
                        raw[(in_y + i) * n + kn_y + j] = val as i32;
                    }
                }
            }
        }
        Ok(())
    }

    fn command(&mut self, op: Opcode, arg0: u32, arg1: u32, step: ProtocolStep) -> Result<(), ConvError> {
        let status = self.cfu.issue(op, arg0, arg1);
        if status == op.code() {
            return Ok(());
        }
        let err = ConvError::Protocol { layer: self.layer, m: self.m, k: self.k, n: self.n, step, status };
        error!("{}", err);
        Err(err)
    }
}
