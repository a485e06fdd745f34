use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use clio::ClioPath;
use log::error;

use ocho::driver::Chip8Driver;
use ocho::frontend::term::TermFrontend;

// ROMs are looked up here first, then at the literal path
const ROMS_DIR: &str = "Roms";

/// CHIP-8 interpreter with a single-step debugger.
#[derive(Parser)]
struct Args {
    /// ROM file, resolved under Roms/ first
    rom: ClioPath,
    /// Virtual CPU speed in instructions per second
    #[arg(short, long)]
    speed: Option<u64>,
    /// Start paused with the debug panel enabled
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let rom = read_rom(args.rom)?;

    let frontend = TermFrontend::new(args.debug)?;
    let mut driver = Chip8Driver::new(Box::new(frontend), args.speed, args.debug);
    driver.load_rom(&rom)?;
    driver.run()?;
    Ok(())
}

fn read_rom(rom: ClioPath) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let candidate = Path::new(ROMS_DIR).join(rom.as_os_str());
    let mut input = if candidate.exists() {
        clio::Input::new(candidate.as_os_str())?
    } else {
        clio::Input::new(rom.as_os_str())?
    };
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}
