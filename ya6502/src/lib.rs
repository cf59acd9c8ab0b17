//! A cycle-accurate emulation core for the 6502 family of CPUs.
//!
//! The whole point of this crate is the tick-based execution model: instead
//! of executing a whole instruction in one call, [`cpu::Cpu::tick`] advances
//! emulated hardware by exactly one clock cycle. This lets the surrounding
//! system (video/audio chips sharing the same bus) stay perfectly
//! synchronized with the CPU, cycle for cycle.

pub mod cpu;
pub mod memory;

#[cfg(test)]
pub mod test_utils;
