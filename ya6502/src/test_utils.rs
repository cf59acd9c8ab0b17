//! Helpers shared by `cpu`'s and `memory`'s test modules.

use crate::cpu::{Cpu, CpuVariant};
use crate::memory::Ram;

/// Runs the CPU's reset sequence to completion. Test code doing this more
/// than a few times per test usually means the test should use
/// `cpu_with_code!` instead.
pub fn reset(cpu: &mut Cpu<Ram>) {
    cpu.reset();
    cpu.ticks(8).unwrap();
}

/// Creates a `Cpu<Ram>` with a given program loaded at 0xF000 and already
/// reset, ready to execute the first instruction.
pub fn cpu_with_program(program: &[u8]) -> Cpu<Ram> {
    let mut cpu = Cpu::new(Box::new(Ram::with_test_program(program)), CpuVariant::BaselineNmos);
    reset(&mut cpu);
    cpu
}

/// Assembles inline 6502 source using `rustasm6502`, loads it into a fresh
/// `Cpu<Ram>`, and resets it. Example:
///
/// ```ignore
/// let mut cpu = cpu_with_code!(
///     "LDA #10"
///     "STA $20"
/// );
/// ```
#[macro_export]
macro_rules! cpu_with_code {
    ($( $line: expr ),*) => {
        {
            let program = rustasm6502::assemble6502!($( $line )*);
            $crate::test_utils::cpu_with_program(&program)
        }
    }
}
