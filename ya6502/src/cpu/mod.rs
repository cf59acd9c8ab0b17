mod bcd;
mod flags;
pub mod opcodes;
#[cfg(test)]
mod tests;

use crate::memory::{Memory, ReadResult};
use rand::Rng;
use std::fmt;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequenceState {
    Reset(u32),
    Ready,
    Opcode(u8, u32),
    Interrupt(InterruptKind, u32),
}

/// Which silicon variant of the 6502 family this `Cpu` emulates. The
/// differences that matter to this core are BCD support and whether the `D`
/// flag is forced clear on interrupt entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVariant {
    /// The original NMOS 6502/6507, as used in the Atari 2600.
    BaselineNmos,
    /// A Ricoh-derived NMOS part (e.g. the NES's 2A03) with BCD arithmetic
    /// disabled in hardware, even though the `D` flag itself still exists
    /// and can be set/cleared.
    RicohNmos,
    /// An NMOS part with built-in I/O ports (e.g. 6510); behaves like
    /// `BaselineNmos` for every concern this core models.
    NmosWithIoPorts,
    /// A 65C02-class CMOS part: fixes the indirect-JMP page-wrap bug, clears
    /// `D` on interrupt entry, and takes one extra cycle for indirect JMP.
    Cmos,
}

impl CpuVariant {
    fn has_bcd(self) -> bool {
        !matches!(self, CpuVariant::RicohNmos)
    }

    fn is_cmos(self) -> bool {
        matches!(self, CpuVariant::Cmos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptKind {
    Irq,
    Nmi,
}

impl InterruptKind {
    fn vector(self) -> u16 {
        match self {
            InterruptKind::Irq => 0xFFFE,
            InterruptKind::Nmi => 0xFFFA,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CpuError {
    #[error("unknown opcode ${opcode:02X} at ${address:04X}")]
    UnimplementedOpcode { opcode: u8, address: u16 },
    #[error("CPU halted by opcode ${opcode:02X} at ${address:04X}")]
    Halted { opcode: u8, address: u16 },
    #[error("invalid internal CPU state: {0}")]
    InvalidInternalState(String),
    #[error(transparent)]
    Read(#[from] crate::memory::ReadError),
    #[error(transparent)]
    Write(#[from] crate::memory::WriteError),
}

pub type TickResult = Result<TickOutcome, CpuError>;

/// Information about the cycle that was just executed, returned from every
/// call to [`Cpu::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// True if this was the last cycle of an instruction (or of the reset or
    /// interrupt sequence); the next `tick()` will fetch a new opcode.
    pub instruction_complete: bool,
}

/// A 6502 CPU that operates on a given type of memory. A key to creating a
/// working hardware implementation is to provide a `Memory` implementation
/// specific to your particular hardware.
#[derive(Debug)]
pub struct Cpu<M: Memory> {
    memory: Box<M>,
    variant: CpuVariant,

    // Registers.
    reg_pc: u16,
    reg_a: u8,
    reg_x: u8,
    reg_y: u8,
    reg_sp: u8,
    flags: u8,

    // Tick sequencer state.
    sequence_state: SequenceState,
    // Address.
    adl: u8,
    adh: u8,
    // Base address.
    bal: u8,
    bah: u8,
    // Indirect address.
    ial: u8,
    tmp_data: u8,

    halted: bool,
    halt_opcode: Option<u8>,

    irq_line: bool,
    nmi_pending: bool,
    /// Set when the instruction just executed was a taken branch; on NMOS
    /// silicon this suppresses the interrupt-pending check for exactly the
    /// next opcode fetch.
    skip_interrupt_check: bool,

    rdy: bool,
}

impl<M: Memory + Debug> Cpu<M> {
    /// Creates a new `CPU` that owns given `memory`, emulating the given
    /// silicon variant. The newly created `CPU` is not yet ready for
    /// executing programs; it first needs to be reset using the
    /// [`reset`](#method.reset) method.
    pub fn new(memory: Box<M>, variant: CpuVariant) -> Self {
        let mut rng = rand::thread_rng();
        Cpu {
            memory,
            variant,

            reg_pc: rng.gen(),
            reg_a: rng.gen(),
            reg_x: rng.gen(),
            reg_y: rng.gen(),
            reg_sp: rng.gen(),
            flags: rng.gen(),

            sequence_state: SequenceState::Reset(0),
            adl: rng.gen(),
            adh: rng.gen(),
            bal: rng.gen(),
            bah: rng.gen(),
            ial: rng.gen(),
            tmp_data: rng.gen(),

            halted: false,
            halt_opcode: None,

            irq_line: false,
            nmi_pending: false,
            skip_interrupt_check: false,

            rdy: true,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn mut_memory(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn variant(&self) -> CpuVariant {
        self.variant
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn reg_pc(&self) -> u16 {
        self.reg_pc
    }
    pub fn reg_a(&self) -> u8 {
        self.reg_a
    }
    pub fn reg_x(&self) -> u8 {
        self.reg_x
    }
    pub fn reg_y(&self) -> u8 {
        self.reg_y
    }
    pub fn reg_sp(&self) -> u8 {
        self.reg_sp
    }
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Holds or releases the CPU's `RDY` line. While held low, the CPU idles
    /// at the next instruction boundary instead of fetching the next opcode.
    /// Checked only between instructions, never mid-instruction.
    pub fn set_ready(&mut self, ready: bool) {
        self.rdy = ready;
    }

    /// Sets the level of the external `IRQ` line. An asserted line raises an
    /// interrupt at the next instruction boundary unless the `I` flag is set.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Latches a non-maskable interrupt, to be serviced at the next
    /// instruction boundary regardless of the `I` flag.
    pub fn pulse_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Start the CPU reset sequence. It will last for the next 8 cycles.
    /// During initialization, the CPU reads an address from 0xFFFC and
    /// stores it in the `PC` register. The subsequent [`tick`](#method.tick)
    /// calls will effectively resume program from this address.
    pub fn reset(&mut self) {
        self.sequence_state = SequenceState::Reset(0);
        self.halted = false;
        self.halt_opcode = None;
    }

    /// Performs a single CPU cycle.
    pub fn tick(&mut self) -> TickResult {
        if self.halted {
            return Err(CpuError::Halted {
                opcode: self.halt_opcode.unwrap_or(0),
                address: self.reg_pc,
            });
        }
        self.tick_inner()
    }

    fn tick_inner(&mut self) -> TickResult {
        match self.sequence_state {
            SequenceState::Ready => {
                if !self.rdy {
                    return Ok(TickOutcome {
                        instruction_complete: false,
                    });
                }
                if let Some(kind) = self.pending_interrupt() {
                    self.phantom_read(self.reg_pc);
                    self.sequence_state = SequenceState::Interrupt(kind, 0);
                } else {
                    let opcode = self.consume_program_byte()?;
                    self.sequence_state = SequenceState::Opcode(opcode, 0);
                }
                self.skip_interrupt_check = false;
            }

            SequenceState::Interrupt(kind, subcycle) => self.tick_interrupt(kind, subcycle)?,

            SequenceState::Opcode(opcode, _) if opcodes::HLT_OPCODES.contains(&opcode) => {
                self.halted = true;
                self.halt_opcode = Some(opcode);
                return Err(CpuError::Halted {
                    opcode,
                    address: self.reg_pc.wrapping_sub(1),
                });
            }

            SequenceState::Opcode(opcodes::NOP, _) => {
                self.tick_simple_internal_operation(&mut |_| {})?;
            }
            SequenceState::Opcode(
                opcodes::NOP_IMPLIED_1
                | opcodes::NOP_IMPLIED_2
                | opcodes::NOP_IMPLIED_3
                | opcodes::NOP_IMPLIED_4
                | opcodes::NOP_IMPLIED_5
                | opcodes::NOP_IMPLIED_6,
                _,
            ) => {
                self.tick_simple_internal_operation(&mut |_| {})?;
            }
            SequenceState::Opcode(
                opcodes::NOP_IMM_1
                | opcodes::NOP_IMM_2
                | opcodes::NOP_IMM_3
                | opcodes::NOP_IMM_4
                | opcodes::NOP_IMM_5,
                _,
            ) => {
                self.tick_load_immediate(&mut |_, _| {})?;
            }
            SequenceState::Opcode(opcodes::NOP_ZP_1 | opcodes::NOP_ZP_2 | opcodes::NOP_ZP_3, _) => {
                self.tick_load_zero_page(&mut |_, _| {})?;
            }
            SequenceState::Opcode(
                opcodes::NOP_ZP_X_1
                | opcodes::NOP_ZP_X_2
                | opcodes::NOP_ZP_X_3
                | opcodes::NOP_ZP_X_4
                | opcodes::NOP_ZP_X_5
                | opcodes::NOP_ZP_X_6,
                _,
            ) => {
                self.tick_load_zero_page_x(&mut |_, _| {})?;
            }
            SequenceState::Opcode(opcodes::NOP_ABS, _) => {
                self.tick_load_absolute(&mut |_, _| {})?;
            }
            SequenceState::Opcode(
                opcodes::NOP_ABS_X_1
                | opcodes::NOP_ABS_X_2
                | opcodes::NOP_ABS_X_3
                | opcodes::NOP_ABS_X_4
                | opcodes::NOP_ABS_X_5
                | opcodes::NOP_ABS_X_6,
                _,
            ) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |_, _| {})?;
            }

            SequenceState::Opcode(opcodes::LDA_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDX_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_x(value))?;
            }
            SequenceState::Opcode(opcodes::LDY_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_y(value))?;
            }

            SequenceState::Opcode(opcodes::LDA_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDX_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_x(value))?;
            }
            SequenceState::Opcode(opcodes::LDY_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_y(value))?;
            }

            SequenceState::Opcode(opcodes::LDA_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDY_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| me.set_reg_y(value))?;
            }
            SequenceState::Opcode(opcodes::LDX_ZP_Y, _) => {
                self.tick_load_zero_page_y(&mut |me, value| me.set_reg_x(value))?;
            }

            SequenceState::Opcode(opcodes::LDA_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDX_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_x(value))?;
            }
            SequenceState::Opcode(opcodes::LDY_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_y(value))?;
            }

            SequenceState::Opcode(opcodes::LDA_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDY_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| me.set_reg_y(value))?;
            }
            SequenceState::Opcode(opcodes::LDA_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDX_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| me.set_reg_x(value))?;
            }

            SequenceState::Opcode(opcodes::LDA_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| me.set_reg_a(value))?;
            }
            SequenceState::Opcode(opcodes::LDA_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| me.set_reg_a(value))?;
            }

            SequenceState::Opcode(opcodes::STA_ZP, _) => {
                self.tick_store_zero_page(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::STX_ZP, _) => {
                self.tick_store_zero_page(self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::STY_ZP, _) => {
                self.tick_store_zero_page(self.reg_y)?;
            }

            SequenceState::Opcode(opcodes::STA_ZP_X, _) => {
                self.tick_store_zero_page_x(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::STY_ZP_X, _) => {
                self.tick_store_zero_page_x(self.reg_y)?;
            }
            SequenceState::Opcode(opcodes::STX_ZP_Y, _) => {
                self.tick_store_zero_page_y(self.reg_x)?;
            }

            SequenceState::Opcode(opcodes::STA_ABS, _) => {
                self.tick_store_abs(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::STX_ABS, _) => {
                self.tick_store_abs(self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::STY_ABS, _) => {
                self.tick_store_abs(self.reg_y)?;
            }

            SequenceState::Opcode(opcodes::STA_ABS_X, _) => {
                self.tick_store_abs_indexed(self.reg_x, self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::STA_ABS_Y, _) => {
                self.tick_store_abs_indexed(self.reg_y, self.reg_a)?;
            }

            SequenceState::Opcode(opcodes::STA_X_INDIR, _) => {
                self.tick_store_x_indirect(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::STA_INDIR_Y, _) => {
                self.tick_store_indirect_y(self.reg_a)?;
            }

            SequenceState::Opcode(opcodes::AND_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }
            SequenceState::Opcode(opcodes::AND_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }
            SequenceState::Opcode(opcodes::AND_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }
            SequenceState::Opcode(opcodes::AND_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }
            SequenceState::Opcode(opcodes::AND_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    me.set_reg_a(me.reg_a & value)
                })?;
            }
            SequenceState::Opcode(opcodes::AND_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    me.set_reg_a(me.reg_a & value)
                })?;
            }
            SequenceState::Opcode(opcodes::AND_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }
            SequenceState::Opcode(opcodes::AND_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| me.set_reg_a(me.reg_a & value))?;
            }

            SequenceState::Opcode(opcodes::ORA_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }
            SequenceState::Opcode(opcodes::ORA_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }
            SequenceState::Opcode(opcodes::ORA_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }
            SequenceState::Opcode(opcodes::ORA_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }
            SequenceState::Opcode(opcodes::ORA_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    me.set_reg_a(me.reg_a | value)
                })?;
            }
            SequenceState::Opcode(opcodes::ORA_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    me.set_reg_a(me.reg_a | value)
                })?;
            }
            SequenceState::Opcode(opcodes::ORA_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }
            SequenceState::Opcode(opcodes::ORA_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| me.set_reg_a(me.reg_a | value))?;
            }

            SequenceState::Opcode(opcodes::EOR_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }
            SequenceState::Opcode(opcodes::EOR_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }
            SequenceState::Opcode(opcodes::EOR_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }
            SequenceState::Opcode(opcodes::EOR_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }
            SequenceState::Opcode(opcodes::EOR_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    me.set_reg_a(me.reg_a ^ value)
                })?;
            }
            SequenceState::Opcode(opcodes::EOR_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    me.set_reg_a(me.reg_a ^ value)
                })?;
            }
            SequenceState::Opcode(opcodes::EOR_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }
            SequenceState::Opcode(opcodes::EOR_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| me.set_reg_a(me.reg_a ^ value))?;
            }

            SequenceState::Opcode(opcodes::ASL_A, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    let shifted = me.shift_left(me.reg_a);
                    me.set_reg_a(shifted);
                })?;
            }
            SequenceState::Opcode(opcodes::ASL_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, value| me.shift_left(value))?;
            }
            SequenceState::Opcode(opcodes::ASL_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, value| me.shift_left(value))?;
            }
            SequenceState::Opcode(opcodes::ASL_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, value| me.shift_left(value))?;
            }
            SequenceState::Opcode(opcodes::ASL_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, value| me.shift_left(value))?;
            }

            SequenceState::Opcode(opcodes::LSR_A, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    let shifted = me.shift_right(me.reg_a);
                    me.set_reg_a(shifted);
                })?;
            }
            SequenceState::Opcode(opcodes::LSR_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, value| me.shift_right(value))?;
            }
            SequenceState::Opcode(opcodes::LSR_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, value| me.shift_right(value))?;
            }
            SequenceState::Opcode(opcodes::LSR_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, value| me.shift_right(value))?;
            }
            SequenceState::Opcode(opcodes::LSR_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, value| me.shift_right(value))?;
            }

            SequenceState::Opcode(opcodes::ROL_A, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    let rotated = me.rotate_left(me.reg_a);
                    me.set_reg_a(rotated);
                })?;
            }
            SequenceState::Opcode(opcodes::ROL_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, value| me.rotate_left(value))?;
            }
            SequenceState::Opcode(opcodes::ROL_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, value| me.rotate_left(value))?;
            }
            SequenceState::Opcode(opcodes::ROL_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, value| me.rotate_left(value))?;
            }
            SequenceState::Opcode(opcodes::ROL_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, value| me.rotate_left(value))?;
            }

            SequenceState::Opcode(opcodes::ROR_A, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    let rotated = me.rotate_right(me.reg_a);
                    me.set_reg_a(rotated);
                })?;
            }
            SequenceState::Opcode(opcodes::ROR_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, value| me.rotate_right(value))?;
            }
            SequenceState::Opcode(opcodes::ROR_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, value| me.rotate_right(value))?;
            }
            SequenceState::Opcode(opcodes::ROR_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, value| me.rotate_right(value))?;
            }
            SequenceState::Opcode(opcodes::ROR_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, value| me.rotate_right(value))?;
            }

            SequenceState::Opcode(opcodes::CMP_IMM, _) => {
                self.tick_compare_immediate(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::CMP_ZP, _) => {
                self.tick_compare_zero_page(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::CMP_ZP_X, _) => {
                self.tick_compare_zero_page_x(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::CMP_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.compare(me.reg_a, value))?;
            }
            SequenceState::Opcode(opcodes::CMP_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    me.compare(me.reg_a, value)
                })?;
            }
            SequenceState::Opcode(opcodes::CMP_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    me.compare(me.reg_a, value)
                })?;
            }
            SequenceState::Opcode(opcodes::CMP_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| me.compare(me.reg_a, value))?;
            }
            SequenceState::Opcode(opcodes::CMP_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| me.compare(me.reg_a, value))?;
            }

            SequenceState::Opcode(opcodes::CPX_IMM, _) => {
                self.tick_compare_immediate(self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::CPX_ZP, _) => {
                self.tick_compare_zero_page(self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::CPX_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.compare(me.reg_x, value))?;
            }

            SequenceState::Opcode(opcodes::CPY_IMM, _) => {
                self.tick_compare_immediate(self.reg_y)?;
            }
            SequenceState::Opcode(opcodes::CPY_ZP, _) => {
                self.tick_compare_zero_page(self.reg_y)?;
            }
            SequenceState::Opcode(opcodes::CPY_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.compare(me.reg_y, value))?;
            }

            SequenceState::Opcode(opcodes::BIT_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| me.test_bits(value))?;
            }
            SequenceState::Opcode(opcodes::BIT_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| me.test_bits(value))?;
            }

            SequenceState::Opcode(opcodes::ADC_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }
            SequenceState::Opcode(opcodes::ADC_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| {
                    let sum = me.add_with_carry(me.reg_a, value);
                    me.store_reg_a(sum);
                })?;
            }

            SequenceState::Opcode(opcodes::SBC_IMM | opcodes::SBC_IMM_ILLEGAL, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_ZP, _) => {
                self.tick_load_zero_page(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_ZP_X, _) => {
                self.tick_load_zero_page_x(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_ABS, _) => {
                self.tick_load_absolute(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_ABS_X, _) => {
                self.tick_load_absolute_indexed(self.reg_x, &mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }
            SequenceState::Opcode(opcodes::SBC_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut |me, value| {
                    let diff = me.sub_with_carry(me.reg_a, value);
                    me.store_reg_a(diff);
                })?;
            }

            SequenceState::Opcode(opcodes::INC_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, val| me.inc(val))?;
            }
            SequenceState::Opcode(opcodes::INC_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, val| me.inc(val))?;
            }
            SequenceState::Opcode(opcodes::INC_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, val| me.inc(val))?;
            }
            SequenceState::Opcode(opcodes::INC_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, val| me.inc(val))?;
            }

            SequenceState::Opcode(opcodes::DEC_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut |me, val| me.dec(val))?;
            }
            SequenceState::Opcode(opcodes::DEC_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut |me, val| me.dec(val))?;
            }
            SequenceState::Opcode(opcodes::DEC_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut |me, val| me.dec(val))?;
            }
            SequenceState::Opcode(opcodes::DEC_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut |me, val| me.dec(val))?;
            }

            SequenceState::Opcode(opcodes::INX, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    me.set_reg_x(me.reg_x.wrapping_add(1))
                })?;
            }
            SequenceState::Opcode(opcodes::INY, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    me.set_reg_y(me.reg_y.wrapping_add(1))
                })?;
            }
            SequenceState::Opcode(opcodes::DEX, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    me.set_reg_x(me.reg_x.wrapping_sub(1))
                })?;
            }
            SequenceState::Opcode(opcodes::DEY, _) => {
                self.tick_simple_internal_operation(&mut |me| {
                    me.set_reg_y(me.reg_y.wrapping_sub(1))
                })?;
            }

            SequenceState::Opcode(opcodes::TAX, _) => {
                self.tick_simple_internal_operation(&mut |me| me.set_reg_x(me.reg_a))?;
            }
            SequenceState::Opcode(opcodes::TAY, _) => {
                self.tick_simple_internal_operation(&mut |me| me.set_reg_y(me.reg_a))?;
            }
            SequenceState::Opcode(opcodes::TXA, _) => {
                self.tick_simple_internal_operation(&mut |me| me.set_reg_a(me.reg_x))?;
            }
            SequenceState::Opcode(opcodes::TYA, _) => {
                self.tick_simple_internal_operation(&mut |me| me.set_reg_a(me.reg_y))?;
            }
            SequenceState::Opcode(opcodes::TXS, _) => {
                self.tick_simple_internal_operation(&mut |me| me.reg_sp = me.reg_x)?;
            }
            SequenceState::Opcode(opcodes::TSX, _) => {
                self.tick_simple_internal_operation(&mut |me| me.set_reg_x(me.reg_sp))?;
            }

            SequenceState::Opcode(opcodes::PHP, _) => {
                self.tick_push(self.flags | flags::PUSHED | flags::B)?;
            }
            SequenceState::Opcode(opcodes::PLP, _) => {
                self.tick_pull(&mut |me, value| me.flags = (value & !flags::B) | flags::UNUSED)?;
            }
            SequenceState::Opcode(opcodes::PHA, _) => {
                self.tick_push(self.reg_a)?;
            }
            SequenceState::Opcode(opcodes::PLA, _) => {
                self.tick_pull(&mut |me, value| me.set_reg_a(value))?;
            }

            SequenceState::Opcode(opcodes::SEI, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags |= flags::I)?;
            }
            SequenceState::Opcode(opcodes::CLI, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags &= !flags::I)?;
            }
            SequenceState::Opcode(opcodes::SED, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags |= flags::D)?;
            }
            SequenceState::Opcode(opcodes::CLD, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags &= !flags::D)?;
            }
            SequenceState::Opcode(opcodes::SEC, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags |= flags::C)?;
            }
            SequenceState::Opcode(opcodes::CLC, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags &= !flags::C)?;
            }
            SequenceState::Opcode(opcodes::CLV, _) => {
                self.tick_simple_internal_operation(&mut |me| me.flags &= !flags::V)?;
            }

            SequenceState::Opcode(opcodes::BEQ, _) => {
                self.tick_branch_if_flag(flags::Z, flags::Z)?;
            }
            SequenceState::Opcode(opcodes::BNE, _) => {
                self.tick_branch_if_flag(flags::Z, 0)?;
            }
            SequenceState::Opcode(opcodes::BCC, _) => {
                self.tick_branch_if_flag(flags::C, 0)?;
            }
            SequenceState::Opcode(opcodes::BCS, _) => {
                self.tick_branch_if_flag(flags::C, flags::C)?;
            }
            SequenceState::Opcode(opcodes::BPL, _) => {
                self.tick_branch_if_flag(flags::N, 0)?;
            }
            SequenceState::Opcode(opcodes::BMI, _) => {
                self.tick_branch_if_flag(flags::N, flags::N)?;
            }
            SequenceState::Opcode(opcodes::BVS, _) => {
                self.tick_branch_if_flag(flags::V, flags::V)?;
            }
            SequenceState::Opcode(opcodes::BVC, _) => {
                self.tick_branch_if_flag(flags::V, 0)?;
            }

            SequenceState::Opcode(opcodes::JMP_ABS, subcycle) => match subcycle {
                1 => self.adl = self.consume_program_byte()?,
                _ => {
                    self.adh = self.memory.read(self.reg_pc)?;
                    self.reg_pc = self.address();
                    self.sequence_state = SequenceState::Ready;
                }
            },
            SequenceState::Opcode(opcodes::JMP_INDIR, _) => {
                self.tick_jmp_indirect()?;
            }
            SequenceState::Opcode(opcodes::JSR, subcycle) => match subcycle {
                1 => self.adl = self.consume_program_byte()?,
                2 => {
                    self.phantom_read(self.stack_pointer());
                }
                3 => {
                    self.memory
                        .write(self.stack_pointer(), (self.reg_pc >> 8) as u8)?;
                    self.reg_sp = self.reg_sp.wrapping_sub(1);
                }
                4 => {
                    self.memory.write(self.stack_pointer(), self.reg_pc as u8)?;
                    self.reg_sp = self.reg_sp.wrapping_sub(1);
                }
                _ => {
                    self.adh = self.memory.read(self.reg_pc)?;
                    self.reg_pc = self.address();
                    self.sequence_state = SequenceState::Ready;
                }
            },
            SequenceState::Opcode(opcodes::RTS, subcycle) => match subcycle {
                1 => {
                    let _ = self.consume_program_byte()?;
                }
                2 => {
                    self.phantom_read(self.stack_pointer());
                    self.reg_sp = self.reg_sp.wrapping_add(1);
                }
                3 => {
                    self.reg_pc =
                        self.reg_pc & 0xFF00 | self.memory.read(self.stack_pointer())? as u16;
                    self.reg_sp = self.reg_sp.wrapping_add(1);
                }
                4 => {
                    self.reg_pc = self.reg_pc & 0xFF
                        | ((self.memory.read(self.stack_pointer())? as u16) << 8)
                }
                _ => {
                    let _ = self.consume_program_byte()?;
                    self.sequence_state = SequenceState::Ready;
                }
            },
            SequenceState::Opcode(opcodes::RTI, subcycle) => match subcycle {
                1 => {
                    let _ = self.consume_program_byte()?;
                }
                2 => {
                    self.phantom_read(self.stack_pointer());
                    self.reg_sp = self.reg_sp.wrapping_add(1);
                }
                3 => {
                    self.flags = self.memory.read(self.stack_pointer())? & !flags::B | flags::UNUSED;
                    self.reg_sp = self.reg_sp.wrapping_add(1);
                }
                4 => {
                    self.reg_pc =
                        self.reg_pc & 0xFF00 | self.memory.read(self.stack_pointer())? as u16;
                    self.reg_sp = self.reg_sp.wrapping_add(1);
                }
                _ => {
                    self.reg_pc = self.reg_pc & 0xFF
                        | ((self.memory.read(self.stack_pointer())? as u16) << 8);
                    self.sequence_state = SequenceState::Ready;
                }
            },
            SequenceState::Opcode(opcodes::BRK, subcycle) => match subcycle {
                1 => {
                    let _ = self.consume_program_byte()?;
                }
                2 => {
                    self.memory
                        .write(self.stack_pointer(), (self.reg_pc >> 8) as u8)?;
                    self.reg_sp = self.reg_sp.wrapping_sub(1);
                }
                3 => {
                    self.memory.write(self.stack_pointer(), self.reg_pc as u8)?;
                    self.reg_sp = self.reg_sp.wrapping_sub(1);
                }
                4 => {
                    self.memory
                        .write(self.stack_pointer(), self.flags | flags::PUSHED | flags::B)?;
                    self.reg_sp = self.reg_sp.wrapping_sub(1);
                    self.flags |= flags::I;
                    if self.variant.is_cmos() {
                        self.flags &= !flags::D;
                    }
                }
                5 => {
                    self.adl = self.memory.read(0xFFFE)?;
                }
                _ => {
                    self.adh = self.memory.read(0xFFFF)?;
                    self.reg_pc = self.address();
                    self.sequence_state = SequenceState::Ready;
                }
            },

            // Stable undocumented opcodes.
            SequenceState::Opcode(opcodes::SLO_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_slo)?;
            }
            SequenceState::Opcode(opcodes::SLO_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_slo)?;
            }

            SequenceState::Opcode(opcodes::RLA_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_rla)?;
            }
            SequenceState::Opcode(opcodes::RLA_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_rla)?;
            }

            SequenceState::Opcode(opcodes::SRE_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_sre)?;
            }
            SequenceState::Opcode(opcodes::SRE_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_sre)?;
            }

            SequenceState::Opcode(opcodes::RRA_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_rra)?;
            }
            SequenceState::Opcode(opcodes::RRA_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_rra)?;
            }

            SequenceState::Opcode(opcodes::DCP_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_dcp)?;
            }
            SequenceState::Opcode(opcodes::DCP_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_dcp)?;
            }

            SequenceState::Opcode(opcodes::ISC_ZP, _) => {
                self.tick_load_modify_store_zero_page(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_ZP_X, _) => {
                self.tick_load_modify_store_zero_page_x(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_ABS, _) => {
                self.tick_load_modify_store_absolute(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_ABS_X, _) => {
                self.tick_load_modify_store_absolute_x(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_ABS_Y, _) => {
                self.tick_load_modify_store_absolute_y(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_X_INDIR, _) => {
                self.tick_load_modify_store_x_indirect(&mut Self::op_isc)?;
            }
            SequenceState::Opcode(opcodes::ISC_INDIR_Y, _) => {
                self.tick_load_modify_store_indirect_y(&mut Self::op_isc)?;
            }

            SequenceState::Opcode(opcodes::SAX_ZP, _) => {
                self.tick_store_zero_page(self.reg_a & self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::SAX_ZP_Y, _) => {
                self.tick_store_zero_page_y(self.reg_a & self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::SAX_ABS, _) => {
                self.tick_store_abs(self.reg_a & self.reg_x)?;
            }
            SequenceState::Opcode(opcodes::SAX_X_INDIR, _) => {
                self.tick_store_x_indirect(self.reg_a & self.reg_x)?;
            }

            SequenceState::Opcode(opcodes::LAX_ZP, _) => {
                self.tick_load_zero_page(&mut Self::op_lax)?;
            }
            SequenceState::Opcode(opcodes::LAX_ZP_Y, _) => {
                self.tick_load_zero_page_y(&mut Self::op_lax)?;
            }
            SequenceState::Opcode(opcodes::LAX_ABS, _) => {
                self.tick_load_absolute(&mut Self::op_lax)?;
            }
            SequenceState::Opcode(opcodes::LAX_ABS_Y, _) => {
                self.tick_load_absolute_indexed(self.reg_y, &mut Self::op_lax)?;
            }
            SequenceState::Opcode(opcodes::LAX_X_INDIR, _) => {
                self.tick_load_x_indirect(&mut Self::op_lax)?;
            }
            SequenceState::Opcode(opcodes::LAX_INDIR_Y, _) => {
                self.tick_load_indirect_y(&mut Self::op_lax)?;
            }

            SequenceState::Opcode(opcodes::ALR_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let anded = me.reg_a & value;
                    let shifted = me.shift_right(anded);
                    me.set_reg_a(shifted);
                })?;
            }
            SequenceState::Opcode(opcodes::ANC_IMM_1 | opcodes::ANC_IMM_2, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let anded = me.reg_a & value;
                    me.set_reg_a(anded);
                    me.flags = (me.flags & !flags::C) | if anded & 0x80 != 0 { flags::C } else { 0 };
                })?;
            }
            SequenceState::Opcode(opcodes::ARR_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let anded = me.reg_a & value;
                    let carry_in = me.flags & flags::C;
                    let rotated = (anded >> 1) | (carry_in << 7);
                    me.set_reg_a(rotated);
                    let bit6 = (rotated >> 6) & 1;
                    let bit5 = (rotated >> 5) & 1;
                    me.flags = (me.flags & !(flags::C | flags::V))
                        | (bit6 * flags::C)
                        | ((bit6 ^ bit5) * flags::V);
                })?;
            }
            SequenceState::Opcode(opcodes::AXS_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let anded = me.reg_a & me.reg_x;
                    let (result, borrow) = anded.overflowing_sub(value);
                    me.reg_x = result;
                    me.update_flags_nz(result);
                    me.flags = (me.flags & !flags::C) | if borrow { 0 } else { flags::C };
                })?;
            }
            SequenceState::Opcode(opcodes::XAA_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    let result = me.xaa(value);
                    me.set_reg_a(result);
                })?;
            }
            SequenceState::Opcode(opcodes::OAL_IMM, _) => {
                self.tick_load_immediate(&mut |me, value| {
                    if rand::thread_rng().gen_bool(0.5) {
                        let result = me.xaa(value);
                        me.set_reg_a(result);
                    } else {
                        let result = me.reg_a & value;
                        me.set_reg_a(result);
                        me.reg_x = result;
                    }
                })?;
            }

            // Reset sequence. The first six cycles are idle, mirroring real
            // silicon reading and discarding bus values while the reset
            // vector fetch completes.
            SequenceState::Reset(0) => {
                self.flags |= flags::UNUSED | flags::I;
                self.reg_sp = self.reg_sp.wrapping_sub(3);
                self.skip_interrupt_check = false;
            }
            SequenceState::Reset(1..=5) => {}
            SequenceState::Reset(6) => {
                self.adl = self.memory.read(0xFFFC)?;
            }
            SequenceState::Reset(7) => {
                self.adh = self.memory.read(0xFFFD)?;
                self.reg_pc = self.address();
                self.sequence_state = SequenceState::Ready;
            }
            SequenceState::Reset(other) => {
                return Err(CpuError::InvalidInternalState(format!(
                    "reset subcycle out of range: {other}"
                )));
            }

            SequenceState::Opcode(other_opcode, subcycle) if subcycle > 8 => {
                return Err(CpuError::InvalidInternalState(format!(
                    "runaway instruction ${other_opcode:02X}: subcycle {subcycle}"
                )));
            }

            // Oh no, we don't support it! (Yet.)
            SequenceState::Opcode(other_opcode, _) => {
                self.halted = true;
                self.halt_opcode = Some(other_opcode);
                return Err(CpuError::UnimplementedOpcode {
                    opcode: other_opcode,
                    address: self.reg_pc.wrapping_sub(1),
                });
            }
        }

        // Now move on to the next subcycle.
        match self.sequence_state {
            SequenceState::Opcode(opcode, subcycle) => {
                self.sequence_state = SequenceState::Opcode(opcode, subcycle + 1)
            }
            SequenceState::Reset(subcycle) => {
                self.sequence_state = SequenceState::Reset(subcycle + 1)
            }
            SequenceState::Interrupt(kind, subcycle) => {
                self.sequence_state = SequenceState::Interrupt(kind, subcycle + 1)
            }
            SequenceState::Ready => {}
        };
        Ok(TickOutcome {
            instruction_complete: matches!(self.sequence_state, SequenceState::Ready),
        })
    }

    /// Returns the kind of interrupt that should begin at the next
    /// instruction boundary, if any. A taken branch suppresses the check for
    /// exactly one subsequent opcode fetch, matching NMOS silicon.
    fn pending_interrupt(&self) -> Option<InterruptKind> {
        if self.skip_interrupt_check {
            return None;
        }
        if self.nmi_pending {
            Some(InterruptKind::Nmi)
        } else if self.irq_line && self.flags & flags::I == 0 {
            Some(InterruptKind::Irq)
        } else {
            None
        }
    }

    fn tick_interrupt(&mut self, kind: InterruptKind, subcycle: u32) -> Result<(), CpuError> {
        match subcycle {
            0 | 1 => {
                self.phantom_read(self.reg_pc);
            }
            2 => {
                self.memory
                    .write(self.stack_pointer(), (self.reg_pc >> 8) as u8)?;
                self.reg_sp = self.reg_sp.wrapping_sub(1);
            }
            3 => {
                self.memory.write(self.stack_pointer(), self.reg_pc as u8)?;
                self.reg_sp = self.reg_sp.wrapping_sub(1);
            }
            4 => {
                self.memory
                    .write(self.stack_pointer(), (self.flags | flags::UNUSED) & !flags::B)?;
                self.reg_sp = self.reg_sp.wrapping_sub(1);
                self.flags |= flags::I;
                if self.variant.is_cmos() {
                    self.flags &= !flags::D;
                }
            }
            5 => {
                self.adl = self.memory.read(kind.vector())?;
            }
            _ => {
                self.adh = self.memory.read(kind.vector() + 1)?;
                self.reg_pc = self.address();
                if kind == InterruptKind::Nmi {
                    self.nmi_pending = false;
                }
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_simple_internal_operation(
        &mut self,
        operation: &mut dyn FnMut(&mut Self),
    ) -> Result<(), CpuError> {
        self.phantom_read(self.reg_pc);
        operation(self);
        self.sequence_state = SequenceState::Ready;
        Ok(())
    }

    fn tick_load_immediate(&mut self, load: &mut dyn FnMut(&mut Self, u8)) -> Result<(), CpuError> {
        let value = self.consume_program_byte()?;
        load(self, value);
        self.sequence_state = SequenceState::Ready;
        Ok(())
    }

    fn tick_load_zero_page(&mut self, load: &mut dyn FnMut(&mut Self, u8)) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            _ => {
                load(self, self.memory.read(self.adl as u16)?);
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_load_zero_page_x(
        &mut self,
        load: &mut dyn FnMut(&mut Self, u8),
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            _ => {
                load(
                    self,
                    self.memory.read(self.bal.wrapping_add(self.reg_x) as u16)?,
                );
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_load_zero_page_y(
        &mut self,
        load: &mut dyn FnMut(&mut Self, u8),
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            _ => {
                load(
                    self,
                    self.memory.read(self.bal.wrapping_add(self.reg_y) as u16)?,
                );
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_load_absolute(&mut self, load: &mut dyn FnMut(&mut Self, u8)) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.adh = self.consume_program_byte()?,
            _ => {
                load(self, self.memory.read(self.address())?);
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_load_absolute_indexed(
        &mut self,
        index: u8,
        load: &mut dyn FnMut(&mut Self, u8),
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bah = self.consume_program_byte()?,
            SequenceState::Opcode(_, 3) => {
                let (adl, carry) = self.bal.overflowing_add(index);
                let address = u16::from_le_bytes([adl, self.bah]);
                if carry {
                    self.phantom_read(address);
                } else {
                    load(self, self.memory.read(address)?);
                    self.sequence_state = SequenceState::Ready;
                }
            }
            _ => {
                load(
                    self,
                    self.memory
                        .read(self.base_address().wrapping_add(index as u16))?,
                );
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_load_x_indirect(
        &mut self,
        load: &mut dyn FnMut(&mut Self, u8),
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            SequenceState::Opcode(_, 3) => {
                self.adl = self.memory.read(self.bal.wrapping_add(self.reg_x) as u16)?;
            }
            SequenceState::Opcode(_, 4) => {
                self.adh = self
                    .memory
                    .read(self.bal.wrapping_add(self.reg_x).wrapping_add(1) as u16)?;
            }
            _ => {
                load(self, self.memory.read(self.address())?);
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_indirect_y(
        &mut self,
        load: &mut dyn FnMut(&mut Self, u8),
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.ial = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bal = self.memory.read(self.ial as u16)?,
            SequenceState::Opcode(_, 3) => {
                self.bah = self.memory.read(self.ial.wrapping_add(1) as u16)?
            }
            SequenceState::Opcode(_, 4) => {
                let (adl, carry) = self.bal.overflowing_add(self.reg_y);
                let address = u16::from_le_bytes([adl, self.bah]);
                if carry {
                    self.phantom_read(address);
                } else {
                    load(self, self.memory.read(address)?);
                    self.sequence_state = SequenceState::Ready;
                }
            }
            _ => {
                load(
                    self,
                    self.memory
                        .read(self.base_address().wrapping_add(self.reg_y as u16))?,
                );
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_jmp_indirect(&mut self) -> Result<(), CpuError> {
        let cmos = self.variant.is_cmos();
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.ial = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bah = self.consume_program_byte()?,
            SequenceState::Opcode(_, 3) => {
                self.adl = self.memory.read(u16::from_le_bytes([self.ial, self.bah]))?;
            }
            SequenceState::Opcode(_, 4) if cmos => {
                // The 65C02 spends one extra internal cycle here to fix the
                // page-wrap bug present on NMOS parts.
                self.phantom_read(u16::from_le_bytes([self.ial, self.bah]));
            }
            _ => {
                let ial_next = self.ial.wrapping_add(1);
                let ptr_hi = if cmos && ial_next == 0 {
                    self.bah.wrapping_add(1)
                } else {
                    self.bah
                };
                self.adh = self.memory.read(u16::from_le_bytes([ial_next, ptr_hi]))?;
                self.reg_pc = self.address();
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_store_zero_page(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            _ => {
                self.memory.write(self.adl as u16, value)?;
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_store_zero_page_x(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            _ => {
                self.memory
                    .write((self.bal.wrapping_add(self.reg_x)) as u16, value)?;
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_store_zero_page_y(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            _ => {
                self.memory
                    .write((self.bal.wrapping_add(self.reg_y)) as u16, value)?;
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_store_abs(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.adh = self.consume_program_byte()?,
            _ => {
                self.memory.write(self.address(), value)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_store_abs_indexed(&mut self, index: u8, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bah = self.consume_program_byte()?,
            SequenceState::Opcode(_, 3) => {
                self.phantom_read(u16::from_le_bytes([self.bal.wrapping_add(index), self.bah]));
            }
            _ => {
                self.memory
                    .write(self.base_address().wrapping_add(index as u16), value)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_store_x_indirect(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            SequenceState::Opcode(_, 3) => {
                self.adl = self.memory.read(self.bal.wrapping_add(self.reg_x) as u16)?;
            }
            SequenceState::Opcode(_, 4) => {
                self.adh = self
                    .memory
                    .read(self.bal.wrapping_add(self.reg_x).wrapping_add(1) as u16)?;
            }
            _ => {
                self.memory.write(self.address(), value)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_store_indirect_y(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.ial = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bal = self.memory.read(self.ial as u16)?,
            SequenceState::Opcode(_, 3) => {
                self.bah = self.memory.read(self.ial.wrapping_add(1) as u16)?
            }
            SequenceState::Opcode(_, 4) => {
                self.phantom_read(u16::from_le_bytes([
                    self.bal.wrapping_add(self.reg_y),
                    self.bah,
                ]));
            }
            _ => {
                self.memory
                    .write(self.base_address().wrapping_add(self.reg_y as u16), value)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_zero_page(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.tmp_data = self.memory.read(self.adl as u16)?,
            SequenceState::Opcode(_, 3) => {
                self.memory.write(self.adl as u16, self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.adl as u16, result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_zero_page_x(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            SequenceState::Opcode(_, 3) => {
                self.adl = self.bal.wrapping_add(self.reg_x);
                self.tmp_data = self.memory.read(self.adl as u16)?;
            }
            SequenceState::Opcode(_, 4) => {
                self.memory.write(self.adl as u16, self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.adl as u16, result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_absolute(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.adl = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.adh = self.consume_program_byte()?,
            SequenceState::Opcode(_, 3) => {
                self.tmp_data = self.memory.read(self.address())?;
            }
            SequenceState::Opcode(_, 4) => {
                self.memory.write(self.address(), self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.address(), result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_absolute_indexed(
        &mut self,
        index: u8,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bah = self.consume_program_byte()?,
            SequenceState::Opcode(_, 3) => {
                let (adl, carry) = self.bal.overflowing_add(index);
                self.phantom_read(u16::from_le_bytes([adl, self.bah]));
                self.adl = adl;
                self.adh = self.bah.wrapping_add(carry as u8);
            }
            SequenceState::Opcode(_, 4) => {
                self.tmp_data = self.memory.read(self.address())?;
            }
            SequenceState::Opcode(_, 5) => {
                self.memory.write(self.address(), self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.address(), result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_absolute_x(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        self.tick_load_modify_store_absolute_indexed(self.reg_x, operation)
    }

    fn tick_load_modify_store_absolute_y(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        self.tick_load_modify_store_absolute_indexed(self.reg_y, operation)
    }

    fn tick_load_modify_store_x_indirect(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.bal = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.phantom_read(self.bal as u16),
            SequenceState::Opcode(_, 3) => {
                self.adl = self.memory.read(self.bal.wrapping_add(self.reg_x) as u16)?;
            }
            SequenceState::Opcode(_, 4) => {
                self.adh = self
                    .memory
                    .read(self.bal.wrapping_add(self.reg_x).wrapping_add(1) as u16)?;
            }
            SequenceState::Opcode(_, 5) => {
                self.tmp_data = self.memory.read(self.address())?;
            }
            SequenceState::Opcode(_, 6) => {
                self.memory.write(self.address(), self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.address(), result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_load_modify_store_indirect_y(
        &mut self,
        operation: &mut dyn FnMut(&mut Self, u8) -> u8,
    ) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.ial = self.consume_program_byte()?,
            SequenceState::Opcode(_, 2) => self.bal = self.memory.read(self.ial as u16)?,
            SequenceState::Opcode(_, 3) => {
                self.bah = self.memory.read(self.ial.wrapping_add(1) as u16)?
            }
            SequenceState::Opcode(_, 4) => {
                let address = self.base_address().wrapping_add(self.reg_y as u16);
                self.adl = address as u8;
                self.adh = (address >> 8) as u8;
                self.phantom_read(address);
            }
            SequenceState::Opcode(_, 5) => {
                self.tmp_data = self.memory.read(self.address())?;
            }
            SequenceState::Opcode(_, 6) => {
                self.memory.write(self.address(), self.tmp_data)?;
            }
            _ => {
                let result = operation(self, self.tmp_data);
                self.memory.write(self.address(), result)?;
                self.sequence_state = SequenceState::Ready;
            }
        }
        Ok(())
    }

    fn tick_compare_immediate(&mut self, register: u8) -> Result<(), CpuError> {
        self.tick_load_immediate(&mut |me, value| me.compare(register, value))
    }

    fn tick_compare_zero_page(&mut self, register: u8) -> Result<(), CpuError> {
        self.tick_load_zero_page(&mut |me, value| me.compare(register, value))
    }

    fn tick_compare_zero_page_x(&mut self, register: u8) -> Result<(), CpuError> {
        self.tick_load_zero_page_x(&mut |me, value| me.compare(register, value))
    }

    fn tick_push(&mut self, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.phantom_read(self.reg_pc),
            _ => {
                self.memory.write(self.stack_pointer(), value)?;
                self.reg_sp = self.reg_sp.wrapping_sub(1);
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_pull(&mut self, load: &mut dyn FnMut(&mut Self, u8)) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => self.phantom_read(self.reg_pc),
            SequenceState::Opcode(_, 2) => {
                self.phantom_read(self.stack_pointer());
                self.reg_sp = self.reg_sp.wrapping_add(1);
            }
            _ => {
                load(self, self.memory.read(self.stack_pointer())?);
                self.sequence_state = SequenceState::Ready;
            }
        };
        Ok(())
    }

    fn tick_branch_if_flag(&mut self, flag: u8, value: u8) -> Result<(), CpuError> {
        match self.sequence_state {
            SequenceState::Opcode(_, 1) => {
                self.adl = self.consume_program_byte()?;
                if self.flags & flag != value {
                    self.sequence_state = SequenceState::Ready;
                }
            }
            SequenceState::Opcode(_, 2) => {
                let new_pc = self.reg_pc.wrapping_add(self.adl as i8 as u16);
                if new_pc & 0xFF00 == self.reg_pc & 0xFF00 {
                    self.phantom_read(self.reg_pc);
                    self.reg_pc = new_pc;
                    self.sequence_state = SequenceState::Ready;
                    // Taken branch, no page crossing: suppress the interrupt
                    // check for the next opcode fetch.
                    self.skip_interrupt_check = true;
                } else {
                    self.phantom_read((new_pc & 0x00FF) | (self.reg_pc & 0xFF00));
                    self.reg_pc = new_pc;
                }
            }
            _ => {
                self.phantom_read(self.reg_pc);
                self.sequence_state = SequenceState::Ready;
                self.skip_interrupt_check = true;
            }
        };
        Ok(())
    }

    // Combined read-modify-store helpers shared by the illegal opcodes.
    fn op_slo(me: &mut Self, value: u8) -> u8 {
        let shifted = me.shift_left(value);
        me.set_reg_a(me.reg_a | shifted);
        shifted
    }

    fn op_rla(me: &mut Self, value: u8) -> u8 {
        let rotated = me.rotate_left(value);
        me.set_reg_a(me.reg_a & rotated);
        rotated
    }

    fn op_sre(me: &mut Self, value: u8) -> u8 {
        let shifted = me.shift_right(value);
        me.set_reg_a(me.reg_a ^ shifted);
        shifted
    }

    fn op_rra(me: &mut Self, value: u8) -> u8 {
        let rotated = me.rotate_right(value);
        let sum = me.add_with_carry(me.reg_a, rotated);
        me.store_reg_a(sum);
        rotated
    }

    fn op_dcp(me: &mut Self, value: u8) -> u8 {
        let decremented = value.wrapping_sub(1);
        me.compare(me.reg_a, decremented);
        decremented
    }

    fn op_isc(me: &mut Self, value: u8) -> u8 {
        let incremented = value.wrapping_add(1);
        let diff = me.sub_with_carry(me.reg_a, incremented);
        me.store_reg_a(diff);
        incremented
    }

    fn op_lax(me: &mut Self, value: u8) {
        me.set_reg_a(value);
        me.reg_x = value;
    }

    fn xaa(&self, immediate: u8) -> u8 {
        (self.reg_a | 0xEE) & self.reg_x & immediate
    }

    /// Reads one byte from the program and advances the program counter.
    fn consume_program_byte(&mut self) -> ReadResult {
        let result = self.memory.read(self.reg_pc)?;
        self.reg_pc = self.reg_pc.wrapping_add(1);
        Ok(result)
    }

    /// Performs a "phantom read", a side effect that usually doesn't matter,
    /// but may matter to devices that react to their pins being read.
    fn phantom_read(&mut self, address: u16) {
        let _ = self.memory.read(address);
    }

    fn set_reg_a(&mut self, value: u8) {
        self.reg_a = value;
        self.update_flags_nz(value);
    }

    /// Stores into A without touching N/Z/V. Used after `add_with_carry`/
    /// `sub_with_carry`, which set those flags themselves from the binary
    /// result of the operation before any BCD adjustment, exactly as NMOS/CMOS
    /// silicon does; recomputing them here from the decimal-corrected value
    /// would be wrong in decimal mode.
    fn store_reg_a(&mut self, value: u8) {
        self.reg_a = value;
    }

    fn set_reg_x(&mut self, value: u8) {
        self.reg_x = value;
        self.update_flags_nz(value);
    }

    fn set_reg_y(&mut self, value: u8) {
        self.reg_y = value;
        self.update_flags_nz(value);
    }

    /// Updates the N and Z flags to reflect the given value.
    fn update_flags_nz(&mut self, value: u8) {
        let flag_z = if value == 0 { flags::Z } else { 0 };
        let flag_n = if value & 0b1000_0000 != 0 {
            flags::N
        } else {
            0
        };
        self.flags = (self.flags & !(flags::Z | flags::N)) | flag_z | flag_n;
    }

    fn test_bits(&mut self, value: u8) {
        self.flags = self.flags & !(flags::N | flags::V | flags::Z)
            | (value & (flags::N | flags::V))
            | if value & self.reg_a == 0 { flags::Z } else { 0 };
    }

    /// Calculates lhs+rhs+C, updates the C, V, N and Z flags, and returns the
    /// result. In BCD mode (on variants that support it) the stored result is
    /// decimal-corrected by the decimal adder, but N, Z and V are still taken
    /// from the binary sum computed below, before decimal correction, since
    /// that's what real NMOS/CMOS silicon sets those flags from.
    fn add_with_carry(&mut self, lhs: u8, rhs: u8) -> u8 {
        let carry_in = self.flags & flags::C != 0;

        let (mut unsigned_sum, mut unsigned_overflow) = lhs.overflowing_add(rhs);
        if carry_in {
            let (unsigned_sum_2, unsigned_overflow_2) = unsigned_sum.overflowing_add(1);
            unsigned_sum = unsigned_sum_2;
            unsigned_overflow |= unsigned_overflow_2;
        }
        let signed_lhs = lhs as i8;
        let signed_rhs = rhs as i8;
        let (mut signed_sum, mut signed_overflow) = signed_lhs.overflowing_add(signed_rhs);
        if carry_in {
            let (signed_sum_2, signed_overflow_2) = signed_sum.overflowing_add(1);
            signed_sum = signed_sum_2;
            signed_overflow |= signed_overflow_2;
        }
        debug_assert_eq!(unsigned_sum, signed_sum as u8);

        let flag_n = if unsigned_sum & 0b1000_0000 != 0 { flags::N } else { 0 };
        let flag_z = if unsigned_sum == 0 { flags::Z } else { 0 };
        let flag_v = if signed_overflow { flags::V } else { 0 };

        if self.flags & flags::D != 0 && self.variant.has_bcd() {
            let (result, carry) = bcd::bcd_add(lhs, rhs, carry_in);
            self.flags = (self.flags & !(flags::C | flags::V | flags::N | flags::Z))
                | if carry { flags::C } else { 0 }
                | flag_n
                | flag_z
                | flag_v;
            return result;
        }

        self.flags = (self.flags & !(flags::C | flags::V | flags::N | flags::Z))
            | if unsigned_overflow { flags::C } else { 0 }
            | flag_n
            | flag_z
            | flag_v;
        unsigned_sum
    }

    /// Calculates lhs-rhs-(1-C), updates the C, V, N and Z flags, and returns
    /// the result. As in `add_with_carry`, N, Z and V in BCD mode come from
    /// the binary difference, not the decimal-corrected one.
    fn sub_with_carry(&mut self, lhs: u8, rhs: u8) -> u8 {
        let borrow_in = self.flags & flags::C == 0;

        let (mut unsigned_diff, mut unsigned_overflow) = lhs.overflowing_sub(rhs);
        if borrow_in {
            let (unsigned_diff_2, unsigned_overflow_2) = unsigned_diff.overflowing_sub(1);
            unsigned_diff = unsigned_diff_2;
            unsigned_overflow |= unsigned_overflow_2;
        }
        let signed_lhs = lhs as i8;
        let signed_rhs = rhs as i8;
        let (mut signed_diff, mut signed_overflow) = signed_lhs.overflowing_sub(signed_rhs);
        if borrow_in {
            let (signed_diff_2, signed_overflow_2) = signed_diff.overflowing_sub(1);
            signed_diff = signed_diff_2;
            signed_overflow |= signed_overflow_2;
        }
        debug_assert_eq!(unsigned_diff, signed_diff as u8);

        let flag_n = if unsigned_diff & 0b1000_0000 != 0 { flags::N } else { 0 };
        let flag_z = if unsigned_diff == 0 { flags::Z } else { 0 };
        let flag_v = if signed_overflow { flags::V } else { 0 };

        if self.flags & flags::D != 0 && self.variant.has_bcd() {
            let (result, borrow) = bcd::bcd_sub(lhs, rhs, borrow_in);
            self.flags = (self.flags & !(flags::C | flags::V | flags::N | flags::Z))
                | if borrow { 0 } else { flags::C }
                | flag_n
                | flag_z
                | flag_v;
            return result;
        }

        self.flags = (self.flags & !(flags::C | flags::V | flags::N | flags::Z))
            | if unsigned_overflow { 0 } else { flags::C }
            | flag_n
            | flag_z
            | flag_v;
        unsigned_diff
    }

    fn shift_left(&mut self, value: u8) -> u8 {
        let carry = (value & (1 << 7)) >> 7;
        self.flags = (self.flags & !flags::C) | carry;
        value << 1
    }

    fn shift_right(&mut self, value: u8) -> u8 {
        let carry = value & 1;
        self.flags = (self.flags & !flags::C) | carry;
        value >> 1
    }

    fn rotate_left(&mut self, value: u8) -> u8 {
        let prev_carry = self.flags & flags::C;
        let carry = (value & (1 << 7)) >> 7;
        self.flags = (self.flags & !flags::C) | carry;
        (value << 1) | prev_carry
    }

    fn rotate_right(&mut self, value: u8) -> u8 {
        let prev_carry = self.flags & flags::C;
        let carry = value & 1;
        self.flags = (self.flags & !flags::C) | carry;
        (value >> 1) | (prev_carry << 7)
    }

    fn compare(&mut self, register: u8, value: u8) {
        let (difference, borrow) = register.overflowing_sub(value);
        self.update_flags_nz(difference);
        self.flags = self.flags & !flags::C | if borrow { 0 } else { flags::C };
    }

    fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.update_flags_nz(result);
        result
    }

    fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.update_flags_nz(result);
        result
    }

    fn stack_pointer(&self) -> u16 {
        0x100 | self.reg_sp as u16
    }

    /// Returns a 16-bit address stored in (`adh`, `adl`).
    fn address(&self) -> u16 {
        u16::from_le_bytes([self.adl, self.adh])
    }

    /// Returns a 16-bit address stored in (`bah`, `bal`).
    fn base_address(&self) -> u16 {
        u16::from_le_bytes([self.bal, self.bah])
    }

    #[cfg(test)]
    fn ticks(&mut self, n_ticks: u32) -> TickResult {
        let mut last = TickOutcome::default();
        for _ in 0..n_ticks {
            last = self.tick()?;
        }
        Ok(last)
    }
}

impl<M: Memory> fmt::Display for Cpu<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "A  X  Y  SP PC   NV-BDIZC\n\
            {:02X} {:02X} {:02X} {:02X} {:04X} {}",
            self.reg_a,
            self.reg_x,
            self.reg_y,
            self.reg_sp,
            self.reg_pc,
            flags::flags_to_string(self.flags)
        )
    }
}
