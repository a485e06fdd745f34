use thiserror::Error;

/// A fault raised by the virtual machine. All of these are fatal: the driver
/// stops ticking and hands the error to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Chip8Error {
    #[error("ROM is {size} bytes, larger than the 3584 bytes of program memory")]
    RomTooLarge { size: usize },

    #[error("illegal instruction {op:#06x} at {pc:#05x}")]
    IllegalInstruction { op: u16, pc: u16 },

    #[error("call stack overflow at {pc:#05x}")]
    StackOverflow { pc: u16 },

    #[error("return with an empty call stack at {pc:#05x}")]
    StackUnderflow { pc: u16 },

    #[error("memory access out of bounds: {addr:#06x}")]
    MemoryOutOfBounds { addr: u16 },

    #[error("zero-height sprite at {pc:#05x}")]
    InvalidSpriteHeight { pc: u16 },
}
