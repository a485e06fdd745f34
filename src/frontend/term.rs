use std::fmt::Write as _;
use std::io::{self, stdout, Read, Stdout, Write};
use std::time::{Duration, Instant};

use termion::color;
use termion::raw::{IntoRawMode, RawTerminal};
use termion::screen::{AlternateScreen, IntoAlternateScreen};

use super::{
    print_memory, print_registers, print_stack, Chip8Frontend, InstructionWindow, KeyInput, KEYMAP,
};
use crate::driver::EmulatorMode;
use crate::emulator::{DISPLAY_COLUMNS, DISPLAY_ROWS, PROGRAM_START};
use crate::Chip8;

// Terminal column where the debug panel starts, just right of the display
const PANEL_COLUMN: u16 = (DISPLAY_COLUMNS + 2) as u16;
// Key presses arrive as a byte stream without release events; holding a bit
// down for a while after its byte is the usual workaround
const KEY_HOLD: Duration = Duration::from_millis(100);

/// TUI host: renders the framebuffer with ANSI block glyphs, reads the
/// keypad from raw-mode stdin, and draws the debug panel beside the display.
pub struct TermFrontend {
    // Input byte stream from tty stdin; raw mode, since canonical mode would
    // buffer keystrokes until enter
    stdin: termion::AsyncReader,
    screen: AlternateScreen<RawTerminal<Stdout>>,
    // Reused between frames so the allocation is roughly constant
    framebuf: String,
    keys: u16,
    key_expire: Instant,
    instruction_window: InstructionWindow,
    last_mode: EmulatorMode,
    last_pc: u16,
    show_panel: bool,
}

impl TermFrontend {
    pub fn new(show_panel: bool) -> io::Result<Self> {
        let mut screen = stdout().into_raw_mode()?.into_alternate_screen()?;
        write!(screen, "{}{}", termion::clear::All, termion::cursor::Hide)?;
        screen.flush()?;

        Ok(Self {
            stdin: termion::async_stdin(),
            screen,
            framebuf: String::new(),
            keys: 0,
            key_expire: Instant::now(),
            instruction_window: InstructionWindow::default(),
            last_mode: EmulatorMode::Running,
            last_pc: PROGRAM_START,
            show_panel,
        })
    }

    fn render_display(&mut self, chip8: &Chip8) {
        self.framebuf.clear();
        for row in 0..DISPLAY_ROWS {
            let _ = write!(
                self.framebuf,
                "{}",
                termion::cursor::Goto(1, (row + 1) as u16)
            );
            for col in 0..DISPLAY_COLUMNS {
                if chip8.memory.display[[col, row]] {
                    let _ = write!(self.framebuf, "{}█", color::Fg(color::White));
                } else {
                    let _ = write!(self.framebuf, "{}█", color::Fg(color::Black));
                }
            }
        }
        let _ = write!(self.screen, "{}{}", self.framebuf, color::Fg(color::Reset));
    }

    fn render_panel(&mut self, chip8: &Chip8, mode: EmulatorMode) {
        self.instruction_window.focus(chip8.pc());

        let mut lines = vec![format!(
            "[{mode:?}] space: run/pause  enter: step  b: breakpoint  esc: quit"
        )];
        lines.extend(print_registers(chip8).lines().map(str::to_owned));
        lines.push(String::new());
        lines.extend(
            self.instruction_window
                .lines(chip8)
                .into_iter()
                .map(|(_, line)| line),
        );
        lines.push(String::new());
        lines.extend(print_stack(chip8).lines().map(str::to_owned));
        lines.push(String::new());
        lines.extend(print_memory(chip8).lines().map(str::to_owned));

        for (row, line) in lines.iter().enumerate() {
            let _ = write!(
                self.screen,
                "{}{}{}",
                termion::cursor::Goto(PANEL_COLUMN, (row + 1) as u16),
                termion::clear::UntilNewline,
                line
            );
        }
    }
}

impl Chip8Frontend for TermFrontend {
    fn update(&mut self, chip8: &Chip8, mode: EmulatorMode, dirty: bool) -> bool {
        self.last_mode = mode;
        self.last_pc = chip8.pc();

        if dirty {
            self.render_display(chip8);
        }
        if self.show_panel {
            self.render_panel(chip8, mode);
        }
        if chip8.sound() {
            let _ = write!(self.screen, "\x07");
        }

        self.screen.flush().is_err()
    }

    fn get_inputs(&mut self) -> Vec<KeyInput> {
        let mut events = Vec::new();

        if self.key_expire.elapsed() >= KEY_HOLD {
            self.keys = 0;
        }

        let mut bytes = Vec::new();
        let _ = self.stdin.read_to_end(&mut bytes);

        for byte in bytes {
            match byte {
                // Esc (0x1B) and ^C (0x03) signal program exit
                0x03 | 0x1B => events.push(KeyInput::Quit),
                b' ' => events.push(match self.last_mode {
                    EmulatorMode::Running => KeyInput::Pause,
                    _ => KeyInput::Run,
                }),
                b'\r' | b'\n' => events.push(KeyInput::Step),
                b'.' => self.show_panel = !self.show_panel,
                b'b' => events.push(KeyInput::ToggleBreakpoint(self.last_pc)),
                _ => {
                    if let Some(&(_, key)) = KEYMAP.iter().find(|(c, _)| *c as u8 == byte) {
                        self.keys |= 1 << key;
                        self.key_expire = Instant::now();
                    }
                }
            }
        }

        events.push(KeyInput::Keys(self.keys));
        events
    }
}

impl Drop for TermFrontend {
    fn drop(&mut self) {
        let _ = write!(self.screen, "{}", termion::cursor::Show);
        let _ = self.screen.flush();
    }
}
