#![cfg(test)]

use crate::console::{Console, ConsoleConfig};

/// Builds and resets a console around an in-memory ROM image, for tests that
/// want a whole running machine rather than a single component.
pub fn console_with_rom(rom_bytes: &[u8]) -> Console {
    let mut console = Console::new(rom_bytes, ConsoleConfig::default()).unwrap();
    console.reset().unwrap();
    console
}

/// Pads or truncates a short test program into a minimal, legally-sized
/// cartridge image (2K), with the reset vector pointed at its start.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 2048];
    rom[..program.len()].copy_from_slice(program);
    rom[0x7FC] = 0x00;
    rom[0x7FD] = 0xF0;
    rom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_running_console() {
        let console = console_with_rom(&rom_with_program(&[]));
        assert!(!console.cpu().halted());
    }
}
