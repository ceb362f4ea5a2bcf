//! A two-pass assembler for the KueChip2 and KueChip3 teaching CPUs.

pub mod driver;
pub mod encoder;
pub mod error;
pub mod expr;
pub mod parser;
pub mod render;
pub mod symbol;

use std::str::FromStr;

pub use driver::{Assembler, Output};
pub use error::{AsmError, AsmErrorKind};

/// Target machine. The two are instruction-compatible; they differ only
/// in how many bytes one address unit occupies, which changes address
/// strides and every hex field width in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Kuechip2,
    Kuechip3,
}

impl Mode {
    /// Bytes per address unit: 1 on KueChip2, 2 on KueChip3.
    pub fn addr_unit_bytes(self) -> i64 {
        match self {
            Mode::Kuechip2 => 1,
            Mode::Kuechip3 => 2,
        }
    }

    /// Hex digits per rendered field (two per byte).
    pub fn hex_digits(self) -> usize {
        self.addr_unit_bytes() as usize * 2
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kuechip2" => Ok(Mode::Kuechip2),
            "kuechip3" => Ok(Mode::Kuechip3),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Assembles `source` and returns the full run output.
pub fn assemble(source: &str, mode: Mode) -> Result<Output, AsmError> {
    Assembler::new(source, mode)?.run()
}
