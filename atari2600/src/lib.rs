//! A cycle-driven emulation core for the Atari 2600: its 6507 CPU (via
//! `ya6502`), the 6532 PIA/RIOT and the TIA video/audio chip, wired together
//! onto the console's 13-bit address bus.

pub mod address_space;
pub mod colors;
pub mod console;
pub mod error;
pub mod memory;
pub mod riot;
pub mod tia;

#[cfg(test)]
pub mod test_utils;
