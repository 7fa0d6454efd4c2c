// Command/register interface of the 4x4 matmul unit. Every command except
// ReadC is acknowledged by echoing its opcode.

pub mod driver;
pub mod model;
pub mod trace;

pub use driver::AcceleratorSession;
pub use model::SoftCfu;
pub use trace::{Command, FaultInjector, Recorder};

/// Output tile edge handled by the unit per accumulation.
pub const TILE: usize = 4;
pub const K_CHUNK: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    /// arg0 = column in chunk, arg1 = four packed activation rows.
    WriteA = 1,
    /// arg0 = column in chunk, arg1 = four packed weight rows.
    WriteB = 2,
    /// arg0 = row offset, arg1 = `3 - column offset`; returns the accumulator.
    ReadC = 3,
    PassK = 4,
    Fire = 5,
    /// Resets the pipeline but keeps the accumulator.
    PartialReset = 6,
    /// Resets the pipeline and the accumulator.
    FullReset = 7,
    /// arg0 = input offset added to every activation byte.
    SetOffset = 8,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::WriteA,
        Opcode::WriteB,
        Opcode::ReadC,
        Opcode::PassK,
        Opcode::Fire,
        Opcode::PartialReset,
        Opcode::FullReset,
        Opcode::SetOffset,
    ];

    pub fn code(self) -> u32 { self as u32 }

    pub fn from_code(code: u32) -> Option<Opcode> { Opcode::ALL.iter().copied().find(|op| op.code() == code) }
}

pub trait Accelerator {
    fn issue(&mut self, op: Opcode, arg0: u32, arg1: u32) -> u32;
}

impl<A: Accelerator + ?Sized> Accelerator for &mut A {
    fn issue(&mut self, op: Opcode, arg0: u32, arg1: u32) -> u32 { (**self).issue(op, arg0, arg1) }
}

/// Packs up to four consecutive bytes into one word, lane `k` at bits `(3 - k) * 8`.
/// Missing lanes stay zero.
#[inline]
pub fn pack_word(lanes: impl IntoIterator<Item = i8>) -> u32 {
    let mut word = 0u32;
    for (k, b) in lanes.into_iter().take(TILE).enumerate() {
        word |= (b as u8 as u32) << ((3 - k) * 8);
    }
    word
}

#[inline]
pub fn unpack_lane(word: u32, k: usize) -> i32 { ((word >> ((3 - k) * 8)) as u8 as i8) as i32 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_is_msb_first() {
        assert_eq!(pack_word([1, 2, 3, 4]), 0x0102_0304);
        assert_eq!(pack_word([-1, 0x10]), 0xFF10_0000);
        let w = pack_word([-128, 127, -2]);
        assert_eq!((unpack_lane(w, 0), unpack_lane(w, 1), unpack_lane(w, 2), unpack_lane(w, 3)), (-128, 127, -2, 0));
    }

    #[test]
    fn opcode_codes() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
        assert_eq!(Opcode::SetOffset.code(), 8);
        assert_eq!(Opcode::from_code(0), None);
    }
}
