use std::fmt;

/// Where in the command sequence the accelerator disagreed with the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolStep {
    SetOffset,
    FullReset { in_y: usize, kn_y: usize },
    WriteA { in_y: usize, kn_y: usize, k_base: usize, col: usize, width: usize },
    WriteB { in_y: usize, kn_y: usize, k_base: usize, col: usize, width: usize },
    PassK { in_y: usize, kn_y: usize, k_base: usize, width: usize },
    PartialReset { in_y: usize, kn_y: usize, k_base: usize },
    Fire { in_y: usize, kn_y: usize, k_base: usize },
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolStep::SetOffset => write!(f, "passing offset"),
            ProtocolStep::FullReset { in_y, kn_y } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, reset unit & accumulator")
            }
            ProtocolStep::WriteA { in_y, kn_y, k_base, col, width } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, k={k_base}, j={col}(<{width}), writing A")
            }
            ProtocolStep::WriteB { in_y, kn_y, k_base, col, width } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, k={k_base}, j={col}(<{width}), writing B")
            }
            ProtocolStep::PassK { in_y, kn_y, k_base, width } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, k={k_base}, passing K={width}")
            }
            ProtocolStep::PartialReset { in_y, kn_y, k_base } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, k={k_base}, reset unit except accumulator")
            }
            ProtocolStep::Fire { in_y, kn_y, k_base } => {
                write!(f, "in_y={in_y}, kn_y={kn_y}, k={k_base}, fire")
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConvError {
    #[error("layer {layer} ({m}x{k}x{n}): {step} returned status {status}")]
    Protocol {
        layer: usize,
        m: usize,
        k: usize,
        n: usize,
        step: ProtocolStep,
        status: u32,
    },
    #[error("{what} needs {requested} elements, scratch capacity is {capacity}")]
    Capacity {
        what: &'static str,
        requested: usize,
        capacity: usize,
    },
}

impl ConvError {
    pub fn is_protocol(&self) -> bool { matches!(self, ConvError::Protocol { .. }) }
}
