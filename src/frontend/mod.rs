pub mod term;

use std::cmp::max;
use std::ops::Range;

use itertools::Itertools;

use crate::driver::EmulatorMode;
use crate::emulator::{INSTRUCTION_SIZE, MEMORY_SIZE, PROGRAM_START};
use crate::instructions::disassemble;
use crate::Chip8;

/// One event from the host: a fresh keypad snapshot, a debugger control or a
/// quit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Bit n is CHIP-8 key n.
    Keys(u16),
    Pause,
    Step,
    Run,
    ToggleBreakpoint(u16),
    Quit,
}

/// Suggested QWERTY layout: physical key -> CHIP-8 key.
pub const KEYMAP: [(char, u8); 16] = [
    ('1', 0x1),
    ('2', 0x2),
    ('3', 0x3),
    ('4', 0xC),
    ('q', 0x4),
    ('w', 0x5),
    ('e', 0x6),
    ('r', 0xD),
    ('a', 0x7),
    ('s', 0x8),
    ('d', 0x9),
    ('f', 0xE),
    ('z', 0xA),
    ('x', 0x0),
    ('c', 0xB),
    ('v', 0xF),
];

/// What the core needs from a host: input events in, frames out.
pub trait Chip8Frontend {
    /// Present the framebuffer (and panel, if any). `dirty` is true when the
    /// framebuffer changed since the last call. Returns true once the host
    /// wants to quit.
    fn update(&mut self, chip8: &Chip8, mode: EmulatorMode, dirty: bool) -> bool;

    /// Drain pending input events.
    fn get_inputs(&mut self) -> Vec<KeyInput>;
}

/// A host with no screen and no keyboard; runs the machine headless.
pub struct NullFrontend;

impl Chip8Frontend for NullFrontend {
    fn update(&mut self, _chip8: &Chip8, _mode: EmulatorMode, _dirty: bool) -> bool {
        false
    }

    fn get_inputs(&mut self) -> Vec<KeyInput> {
        Vec::new()
    }
}

const MEMORY_WINDOW: usize = 8 * 4;

/// Hex dump of the memory window the index register points into.
pub fn print_memory(chip8: &Chip8) -> String {
    let start = (chip8.registers.i as usize).min(MEMORY_SIZE);
    let end = (start + MEMORY_WINDOW).min(MEMORY_SIZE);
    chip8.memory.ram[start..end]
        .iter()
        .tuples()
        .map(|(b0, b1, b2, b3, b4, b5, b6, b7)| {
            format!(
                "{:02x} {:02x} {:02x} {:02x} {:02x} {:02x} {:02x} {:02x}",
                b0, b1, b2, b3, b4, b5, b6, b7
            )
        })
        .join("\n")
}

pub fn print_registers(chip8: &Chip8) -> String {
    let registers = &chip8.registers;
    let mut register_desc: Vec<_> = registers
        .vn
        .iter()
        .enumerate()
        .map(|(index, value)| format!("V{:X}: {:02x}", index, value))
        .collect();
    register_desc.push(format!("pc: {:03x}", registers.pc));
    register_desc.push(format!("i: {:03x}", registers.i));
    register_desc.push(format!("dt: {:02x}", registers.delay));
    register_desc.push(format!("st: {:02x}", registers.sound));
    register_desc.push(format!("sp: {:x}", chip8.sp()));
    register_desc.push(format!("op: {:04x}", chip8.op_code()));

    // itertools::tuples() drops any elements that don't fit in a tuple,
    // so we need to make sure that everything lines up
    while register_desc.len() % 4 != 0 {
        register_desc.push(String::new());
    }

    register_desc
        .iter()
        .tuples()
        .map(|(v1, v2, v3, v4)| format!("{v1}\t{v2}\t{v3}\t{v4}"))
        .join("\n")
}

/// Return-stack listing, innermost frame first.
pub fn print_stack(chip8: &Chip8) -> String {
    let frames = chip8
        .stack()
        .iter()
        .enumerate()
        .rev()
        .map(|(depth, addr)| format!("{depth:x}. |{addr:#05x}|"))
        .join("\n");
    if frames.is_empty() {
        String::from("stack: empty")
    } else {
        format!("stack:\n{frames}")
    }
}

/// A scrollable disassembly listing with a cursor on the program counter.
pub struct InstructionWindow {
    start_addr: usize,
    len: usize,
}

impl InstructionWindow {
    const BASE_ADDR: usize = PROGRAM_START as usize;

    pub fn scroll(&mut self, direction: isize) {
        let step = direction * INSTRUCTION_SIZE as isize;
        self.start_addr = self
            .start_addr
            .saturating_add_signed(step)
            .clamp(0, MEMORY_SIZE - self.len * INSTRUCTION_SIZE as usize);
    }

    /// Center the window a few instructions above `addr`.
    pub fn focus(&mut self, addr: u16) {
        self.start_addr = max(
            (addr as usize).saturating_sub(3 * INSTRUCTION_SIZE as usize),
            InstructionWindow::BASE_ADDR,
        );
    }

    pub fn range(&self) -> Range<usize> {
        let end = (self.start_addr + self.len * INSTRUCTION_SIZE as usize).min(MEMORY_SIZE);
        self.start_addr..end
    }

    pub fn lines(&self, chip8: &Chip8) -> Vec<(usize, String)> {
        let start_addr = self.start_addr;
        let ram_slice = &chip8.memory.ram[self.range()];
        ram_slice
            .iter()
            .enumerate()
            .tuples()
            .map(|((offset, b1), (_, b2)): ((usize, &u8), (usize, &u8))| {
                (start_addr + offset, u16::from_be_bytes([*b1, *b2]))
            })
            .map(|(addr, word)| {
                let line = if addr == chip8.pc() as usize {
                    format!(">>{:#05x}  {}", addr, disassemble(word))
                } else {
                    format!("  {:#05x}  {}", addr, disassemble(word))
                };
                (addr, line)
            })
            .collect_vec()
    }
}

impl Default for InstructionWindow {
    fn default() -> Self {
        Self {
            start_addr: Self::BASE_ADDR,
            len: 8,
        }
    }
}

#[cfg(test)]
fn sample_chip8() -> Chip8 {
    let mut chip8 = Chip8::init(None);
    chip8
        .load_rom(&[0x61, 0x0A, 0xA0, 0x50, 0xD1, 0x25])
        .unwrap();
    chip8
}

#[test]
fn test_keymap_covers_every_key() {
    let mut keys: Vec<u8> = KEYMAP.iter().map(|(_, key)| *key).collect();
    keys.sort();
    assert_eq!(keys, (0..16).collect::<Vec<u8>>());
}

#[test]
fn test_instruction_window_lines() {
    let chip8 = sample_chip8();
    let window = InstructionWindow::default();
    let lines = window.lines(&chip8);
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0].0, 0x200);
    assert_eq!(lines[0].1, ">>0x200  LD V1, 0x0a");
    assert_eq!(lines[1].1, "  0x202  LD I, 0x050");
    assert_eq!(lines[2].1, "  0x204  DRW V1, V2, 5");
}

#[test]
fn test_instruction_window_scroll_clamps() {
    let mut window = InstructionWindow::default();
    window.scroll(-1000);
    assert_eq!(window.range().start, 0);
    window.scroll(10_000);
    assert_eq!(window.range().start, MEMORY_SIZE - 16);
    window.scroll(-1);
    assert_eq!(window.range().start, MEMORY_SIZE - 18);
}

#[test]
fn test_instruction_window_focus_clamps_to_program_start() {
    let mut window = InstructionWindow::default();
    window.focus(0x202);
    assert_eq!(window.range().start, 0x200);
    window.focus(0x280);
    assert_eq!(window.range().start, 0x27a);
}

#[test]
fn test_register_panel_contents() {
    let mut chip8 = sample_chip8();
    chip8.tick().unwrap();
    let panel = print_registers(&chip8);
    assert!(panel.contains("V1: 0a"));
    assert!(panel.contains("pc: 202"));
    assert!(panel.contains("op: 610a"));
}

#[test]
fn test_stack_panel_contents() {
    let mut chip8 = Chip8::init(None);
    assert_eq!(print_stack(&chip8), "stack: empty");
    chip8.load_rom(&[0x22, 0x04]).unwrap();
    chip8.tick().unwrap();
    assert_eq!(print_stack(&chip8), "stack:\n0. |0x202|");
}

#[test]
fn test_memory_panel_stays_in_bounds() {
    let mut chip8 = sample_chip8();
    chip8.registers.i = 0xFFC;
    let dump = print_memory(&chip8);
    // a truncated window renders no partial row
    assert!(dump.is_empty() || dump.lines().all(|line| line.len() == 23));
    chip8.registers.i = 0x050;
    assert!(print_memory(&chip8).starts_with("f0 90 90 90 f0"));
}
