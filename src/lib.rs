pub mod driver;
pub mod emulator;
pub mod errors;
pub mod frontend;
pub mod instructions;

/// Monochrome framebuffer, indexed `[[column, row]]`.
pub type Display = ndarray::Array2<bool>;

pub use driver::{Chip8Driver, EmulatorMode};
pub use emulator::{Chip8, DISPLAY_COLUMNS, DISPLAY_ROWS};
pub use errors::Chip8Error;
pub use instructions::Instruction;
