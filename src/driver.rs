use std::thread::sleep;
use std::time::{Duration, Instant};

use bitvec::{bitarr, BitArr};
use log::{debug, error, info};

use crate::emulator::{Chip8, MEMORY_SIZE};
use crate::errors::Chip8Error;
use crate::frontend::{Chip8Frontend, KeyInput};

pub const FRAME_DURATION: Duration = Duration::from_millis(1000 / 60);
// How long to doze between control polls while paused
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Debugger state. `Stepping` executes exactly one cycle and falls back to
/// `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorMode {
    Running,
    Paused,
    Stepping,
}

/// Owns the machine and a frontend, and runs the
/// `poll input -> tick -> present` loop under debugger control.
pub struct Chip8Driver {
    pub chip8: Chip8,
    frontend: Box<dyn Chip8Frontend>,
    pub mode: EmulatorMode,
    breakpoints: BitArr!(for MEMORY_SIZE),
}

impl Chip8Driver {
    pub fn new(frontend: Box<dyn Chip8Frontend>, speed: Option<u64>, paused: bool) -> Self {
        Self {
            chip8: Chip8::init(speed),
            frontend,
            mode: if paused {
                EmulatorMode::Paused
            } else {
                EmulatorMode::Running
            },
            breakpoints: bitarr![0; MEMORY_SIZE],
        }
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.chip8.load_rom(rom)
    }

    pub fn toggle_breakpoint(&mut self, addr: u16) {
        let index = addr as usize;
        if index < MEMORY_SIZE {
            let set = !self.breakpoints[index];
            self.breakpoints.set(index, set);
            debug!(
                "breakpoint at {addr:#05x} {}",
                if set { "set" } else { "cleared" }
            );
        }
    }

    pub fn is_breakpoint(&self, addr: u16) -> bool {
        self.breakpoints
            .get(addr as usize)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Drive the machine until the host asks to quit or the machine faults.
    /// Each pass around the loop is one 60 Hz host frame.
    pub fn run(&mut self) -> Result<(), Chip8Error> {
        loop {
            let start = Instant::now();
            if self.chip8.shutdown_requested() {
                info!("shutdown requested, stopping");
                return Ok(());
            }
            if let Err(err) = self.step() {
                error!("{err}");
                return Err(err);
            }
            if self.draw() {
                return Ok(());
            }
            if let Some(remaining) = FRAME_DURATION.checked_sub(start.elapsed()) {
                sleep(remaining);
            }
        }
    }

    /// Advance one host frame in the current debugger mode.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        match self.mode {
            EmulatorMode::Paused => {
                self.step_paused();
                Ok(())
            }
            EmulatorMode::Stepping => self.step_single(),
            EmulatorMode::Running => self.step_running(),
        }
    }

    fn step_paused(&mut self) {
        self.poll_inputs();
        if self.mode == EmulatorMode::Paused {
            sleep(PAUSE_POLL_INTERVAL);
        }
    }

    fn step_single(&mut self) -> Result<(), Chip8Error> {
        self.poll_inputs();
        if self.mode != EmulatorMode::Stepping {
            return Ok(());
        }
        self.chip8.tick()?;
        self.set_mode(EmulatorMode::Paused);
        Ok(())
    }

    fn step_running(&mut self) -> Result<(), Chip8Error> {
        let cycles_per_frame = (self.chip8.clock_speed / 60).max(1);
        for _ in 0..cycles_per_frame {
            self.poll_inputs();
            if self.mode != EmulatorMode::Running || self.chip8.shutdown_requested() {
                break;
            }
            self.chip8.tick()?;
            if self.is_breakpoint(self.chip8.pc()) {
                debug!("hit breakpoint at {:#05x}", self.chip8.pc());
                self.set_mode(EmulatorMode::Paused);
                break;
            }
        }
        Ok(())
    }

    fn draw(&mut self) -> bool {
        let dirty = self.chip8.take_dirty_frame();
        self.frontend.update(&self.chip8, self.mode, dirty)
    }

    fn poll_inputs(&mut self) {
        for input in self.frontend.get_inputs() {
            match input {
                KeyInput::Keys(bitmap) => self.chip8.set_keys(bitmap),
                KeyInput::ToggleBreakpoint(addr) => self.toggle_breakpoint(addr),
                KeyInput::Quit => self.chip8.request_shutdown(),
                control => self.apply_control(control),
            }
        }
    }

    /// The debugger transition table. Anything not listed keeps the mode.
    fn apply_control(&mut self, control: KeyInput) {
        use EmulatorMode::*;
        let next = match (self.mode, control) {
            (Running, KeyInput::Pause) => Paused,
            (Paused, KeyInput::Step) => Stepping,
            (Paused, KeyInput::Run) => Running,
            (Stepping, KeyInput::Pause) => Paused,
            (Stepping, KeyInput::Run) => Running,
            _ => return,
        };
        self.set_mode(next);
    }

    fn set_mode(&mut self, next: EmulatorMode) {
        if next == self.mode {
            return;
        }
        // Wall time spent paused must not drain DT/ST
        if self.mode == EmulatorMode::Paused {
            self.chip8.resync_timers();
        }
        debug!("debugger mode {:?} -> {:?}", self.mode, next);
        self.mode = next;
    }
}

#[cfg(test)]
use crate::frontend::NullFrontend;

#[cfg(test)]
fn driver_with_rom(rom: &[u8], paused: bool) -> Chip8Driver {
    let mut driver = Chip8Driver::new(Box::new(NullFrontend), None, paused);
    driver.load_rom(rom).unwrap();
    driver
}

#[test]
fn test_mode_transitions() {
    use EmulatorMode::*;
    let mut driver = driver_with_rom(&[0x12, 0x00], false);
    assert_eq!(driver.mode, Running);

    // ignored in Running
    driver.apply_control(KeyInput::Step);
    assert_eq!(driver.mode, Running);
    driver.apply_control(KeyInput::Run);
    assert_eq!(driver.mode, Running);

    driver.apply_control(KeyInput::Pause);
    assert_eq!(driver.mode, Paused);
    driver.apply_control(KeyInput::Pause);
    assert_eq!(driver.mode, Paused);

    driver.apply_control(KeyInput::Step);
    assert_eq!(driver.mode, Stepping);
    driver.apply_control(KeyInput::Step);
    assert_eq!(driver.mode, Stepping);
    driver.apply_control(KeyInput::Pause);
    assert_eq!(driver.mode, Paused);

    driver.apply_control(KeyInput::Run);
    assert_eq!(driver.mode, Running);
}

#[test]
fn test_debug_launch_starts_paused() {
    let driver = driver_with_rom(&[0x12, 0x00], true);
    assert_eq!(driver.mode, EmulatorMode::Paused);
}

#[test]
fn test_stepping_executes_one_cycle_then_pauses() {
    let mut driver = driver_with_rom(&[0x60, 0x01, 0x61, 0x02], true);
    driver.mode = EmulatorMode::Stepping;
    driver.step().unwrap();
    assert_eq!(driver.chip8.registers.vn[0], 1);
    assert_eq!(driver.chip8.registers.vn[1], 0);
    assert_eq!(driver.mode, EmulatorMode::Paused);

    driver.mode = EmulatorMode::Stepping;
    driver.step().unwrap();
    assert_eq!(driver.chip8.registers.vn[1], 2);
    assert_eq!(driver.mode, EmulatorMode::Paused);
}

#[test]
fn test_running_frame_executes_many_cycles() {
    // 600 Hz and 60 fps: ten cycles per frame, here a tight jump loop
    let mut driver = driver_with_rom(&[0x12, 0x00], false);
    driver.step().unwrap();
    assert_eq!(driver.chip8.pc(), 0x200);
}

#[test]
fn test_breakpoint_pauses_before_executing() {
    let mut driver = driver_with_rom(&[0x60, 0x01, 0x61, 0x02, 0x62, 0x03], false);
    driver.toggle_breakpoint(0x202);
    assert!(driver.is_breakpoint(0x202));
    driver.step().unwrap();
    assert_eq!(driver.mode, EmulatorMode::Paused);
    assert_eq!(driver.chip8.pc(), 0x202);
    assert_eq!(driver.chip8.registers.vn[0], 1);
    assert_eq!(driver.chip8.registers.vn[1], 0);

    driver.toggle_breakpoint(0x202);
    assert!(!driver.is_breakpoint(0x202));
}

#[test]
fn test_machine_fault_surfaces_from_run() {
    let mut driver = driver_with_rom(&[0xFF, 0xFF], false);
    assert_eq!(
        driver.run(),
        Err(Chip8Error::IllegalInstruction {
            op: 0xFFFF,
            pc: 0x200
        })
    );
}

#[test]
fn test_shutdown_stops_run_cleanly() {
    let mut driver = driver_with_rom(&[0x12, 0x00], false);
    driver.chip8.request_shutdown();
    assert_eq!(driver.run(), Ok(()));
}
