//! Crate-wide error type.
//!
//! The executor itself has no recoverable errors (wrapping arithmetic and
//! wrapping addresses absorb everything that would otherwise be an
//! exception); what can fail is getting an image into memory, decoding a
//! word the architecture declares illegal, and the console.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum VmError {
    /// The image file could not be read, or would not fit in memory from
    /// its origin to the end of the address space.
    Load(String),
    /// RTI or RES were fetched; both are illegal for this architecture.
    IllegalOpcode { opcode: u16, pc: u16 },
    /// TRAP with a vector outside the six implemented service routines.
    UnknownTrap(u8),
    Io(io::Error),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Load(reason) => write!(f, "failed to load image: {}", reason),
            VmError::IllegalOpcode { opcode, pc } => write!(
                f,
                "illegal opcode {:#06b} fetched at PC={:#06x}",
                opcode, pc
            ),
            VmError::UnknownTrap(vector) => write!(f, "unknown trap vector {:#04x}", vector),
            VmError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VmError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VmError {
    fn from(e: io::Error) -> Self {
        VmError::Io(e)
    }
}
