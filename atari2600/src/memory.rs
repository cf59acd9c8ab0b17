use crate::error::InitError;
use ya6502::memory::{Memory, Read, ReadResult, Rom, Write, WriteResult};

pub type AtariRom = Rom;

/// Builds the cartridge ROM image. Accepts a flat, headerless 2048- or
/// 4096-byte dump; a 2K image is mirrored to fill the 4K window (see
/// `AddressSpace`'s address decoding), which `Rom`'s own power-of-two
/// mirroring already does for us once the size check below passes.
pub fn new_rom(bytes: &[u8]) -> Result<AtariRom, InitError> {
    match bytes.len() {
        2048 | 4096 => Rom::new(bytes).map_err(|_| InitError::IllegalRomSize { size: bytes.len() }),
        _ => Err(InitError::IllegalRomSize { size: bytes.len() }),
    }
}

/// A 128-byte memory structure that acts as Atari RAM and supports memory
/// space mirroring.
#[derive(Debug)]
pub struct AtariRam {
    bytes: [u8; Self::SIZE],
}

impl AtariRam {
    const SIZE: usize = 0x80;
    pub fn new() -> AtariRam {
        AtariRam {
            bytes: [0; Self::SIZE],
        }
    }
}

impl Read for AtariRam {
    fn read(&mut self, address: u16) -> ReadResult {
        Ok(self.bytes[address as usize & 0b0111_1111])
    }
}

impl Write for AtariRam {
    fn write(&mut self, address: u16, value: u8) -> WriteResult {
        self.bytes[address as usize & 0b0111_1111] = value;
        Ok(())
    }
}

impl Memory for AtariRam {
    fn power_on(&mut self) {
        use rand::Rng;
        rand::thread_rng().fill(&mut self.bytes[..]);
    }
}
