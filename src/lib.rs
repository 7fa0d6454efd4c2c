// Quantized Conv2D lowered onto a 4x4-tile matmul unit
pub mod accel;
pub mod arena;
pub mod config;
pub mod conv;
pub mod error;
pub mod fixed_point;
pub mod geometry;
pub mod pack;
pub mod params;
pub mod requant;
pub mod shape;

// Re-exports for the common entry points
pub use accel::{Accelerator, Opcode, SoftCfu};
pub use arena::ScratchArena;
pub use conv::ConvLayer;
pub use error::{ConvError, ProtocolStep};
pub use params::{ConvParams, Padding, QuantParams};
pub use shape::{Shape4, Tensor, TensorMut};
