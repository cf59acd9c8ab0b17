use super::*;
use crate::cpu_with_code;
use crate::memory::{Ram, Read, ReadResult, Write, WriteResult};
use crate::test_utils::{cpu_with_program, reset};
use mockall::mock;

mock! {
    StalledMemory {}
    impl Read for StalledMemory {
        fn read(&mut self, address: u16) -> ReadResult;
    }
    impl Write for StalledMemory {
        fn write(&mut self, address: u16, value: u8) -> WriteResult;
    }
    impl Memory for StalledMemory {}
}

impl Debug for MockStalledMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockStalledMemory")
    }
}

fn new_cpu(variant: CpuVariant) -> Cpu<Ram> {
    let mut cpu = Cpu::new(Box::new(Ram::with_test_program(&[])), variant);
    reset(&mut cpu);
    cpu
}

#[test]
fn resets_into_ready_state() {
    let cpu = new_cpu(CpuVariant::BaselineNmos);
    assert_eq!(cpu.reg_pc(), 0xF000);
    assert_eq!(cpu.flags() & flags::I, flags::I);
}

#[test]
fn reset_decrements_stack_pointer_by_three() {
    let mut cpu = Cpu::new(Box::new(Ram::with_test_program(&[])), CpuVariant::BaselineNmos);
    let sp_before = cpu.reg_sp();
    reset(&mut cpu);
    assert_eq!(cpu.reg_sp(), sp_before.wrapping_sub(3));
}

#[test]
fn nop_soak_does_not_disturb_registers() {
    let mut cpu = cpu_with_code!("NOP" "NOP" "NOP");
    let (a, x, y) = (cpu.reg_a(), cpu.reg_x(), cpu.reg_y());
    cpu.ticks(6).unwrap();
    assert_eq!((cpu.reg_a(), cpu.reg_x(), cpu.reg_y()), (a, x, y));
}

#[test]
fn lda_immediate_sets_registers_and_flags() {
    let mut cpu = cpu_with_code!("LDA #0");
    cpu.ticks(2).unwrap();
    assert_eq!(cpu.reg_a(), 0);
    assert_eq!(cpu.flags() & flags::Z, flags::Z);

    let mut cpu = cpu_with_code!("LDA #$80");
    cpu.ticks(2).unwrap();
    assert_eq!(cpu.reg_a(), 0x80);
    assert_eq!(cpu.flags() & flags::N, flags::N);
}

#[test]
fn lda_sta_zero_page_round_trips() {
    let mut cpu = cpu_with_code!("LDA #42" "STA $10" "LDA #0" "LDA $10");
    cpu.ticks(2 + 3 + 2 + 3).unwrap();
    assert_eq!(cpu.reg_a(), 42);
}

#[test]
fn indirect_x_pointer_wraps_within_zero_page() {
    // With X=0x01, ($FF,X) should read the pointer from $00/$01, not $100.
    let mut cpu = cpu_with_code!("LDX #1" "LDA ($FF,X)");
    cpu.mut_memory().write(0x0000, 0x34).unwrap();
    cpu.mut_memory().write(0x0001, 0x12).unwrap();
    cpu.mut_memory().write(0x1234, 0x99).unwrap();
    cpu.ticks(2 + 6).unwrap();
    assert_eq!(cpu.reg_a(), 0x99);
}

#[test]
fn adc_in_decimal_mode_adds_bcd() {
    let mut cpu = cpu_with_code!("SED" "LDA #$58" "CLC" "ADC #$27");
    cpu.ticks(2 + 2 + 2 + 2).unwrap();
    assert_eq!(cpu.reg_a(), 0x85);
    assert_eq!(cpu.flags() & flags::C, 0);
}

#[test]
fn adc_decimal_mode_disabled_on_ricoh_variant() {
    let mut cpu = Cpu::new(
        Box::new(Ram::with_test_program(&rustasm6502::assemble6502!(
            "SED" "LDA #$58" "CLC" "ADC #$27"
        ))),
        CpuVariant::RicohNmos,
    );
    reset(&mut cpu);
    cpu.ticks(2 + 2 + 2 + 2).unwrap();
    // Binary 0x58 + 0x27 = 0x7F, not the BCD result 0x85.
    assert_eq!(cpu.reg_a(), 0x7F);
}

#[test]
fn branch_not_taken_costs_two_cycles() {
    let mut cpu = cpu_with_code!("BNE +2" "NOP" "NOP" "LDA #1");
    let outcome = cpu.ticks(2).unwrap();
    assert!(outcome.instruction_complete);
    assert_eq!(cpu.reg_pc(), 0xF002);
}

#[test]
fn branch_taken_same_page_costs_three_cycles() {
    let mut cpu = cpu_with_code!("LDA #0" "BEQ +2" "NOP" "NOP" "LDA #1");
    cpu.ticks(2).unwrap();
    let pc_before_branch = cpu.reg_pc();
    let outcome = cpu.ticks(3).unwrap();
    assert!(outcome.instruction_complete);
    assert_eq!(cpu.reg_pc(), pc_before_branch.wrapping_add(2).wrapping_add(2));
}

#[test]
fn jmp_indirect_nmos_has_page_wrap_bug() {
    let mut cpu = cpu_with_code!("JMP ($30FF)");
    cpu.mut_memory().write(0x30FF, 0x80).unwrap();
    // A correct implementation would read the high byte from $3100; the
    // NMOS bug reads it from $3000 instead.
    cpu.mut_memory().write(0x3100, 0x12).unwrap();
    cpu.mut_memory().write(0x3000, 0x34).unwrap();
    cpu.ticks(5).unwrap();
    assert_eq!(cpu.reg_pc(), 0x3480);
}

#[test]
fn jmp_indirect_cmos_fixes_page_wrap_bug() {
    let mut cpu = Cpu::new(
        Box::new(Ram::with_test_program(&rustasm6502::assemble6502!("JMP ($30FF)"))),
        CpuVariant::Cmos,
    );
    reset(&mut cpu);
    cpu.mut_memory().write(0x30FF, 0x80).unwrap();
    cpu.mut_memory().write(0x3100, 0x12).unwrap();
    cpu.ticks(6).unwrap();
    assert_eq!(cpu.reg_pc(), 0x1280);
}

#[test]
fn jsr_rts_round_trips_through_the_stack() {
    let mut cpu = cpu_with_code!(
        "JSR $F010"
        "NOP"
        );
    cpu.ticks(6).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF010);
}

#[test]
fn brk_pushes_return_address_and_jumps_through_vector() {
    let mut cpu = cpu_with_code!("BRK");
    cpu.mut_memory().write(0xFFFE, 0x00).unwrap();
    cpu.mut_memory().write(0xFFFF, 0xF1).unwrap();
    cpu.ticks(7).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF100);
    assert_eq!(cpu.flags() & flags::I, flags::I);
    let sp = cpu.reg_sp();
    assert_eq!(cpu.mut_memory().read(0x100 | (sp.wrapping_add(1)) as u16).unwrap() & flags::B, flags::B);
}

#[test]
fn irq_is_ignored_while_interrupt_disable_flag_set() {
    let mut cpu = cpu_with_code!("SEI" "NOP" "NOP");
    cpu.ticks(2).unwrap();
    cpu.set_irq_line(true);
    let pc_before = cpu.reg_pc();
    cpu.ticks(2).unwrap();
    assert_eq!(cpu.reg_pc(), pc_before.wrapping_add(1));
}

#[test]
fn irq_is_serviced_when_interrupt_disable_flag_clear() {
    let mut cpu = cpu_with_code!("CLI" "NOP" "NOP");
    cpu.mut_memory().write(0xFFFE, 0x00).unwrap();
    cpu.mut_memory().write(0xFFFF, 0xF2).unwrap();
    cpu.ticks(2).unwrap();
    cpu.set_irq_line(true);
    cpu.ticks(7).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF200);
    assert_eq!(cpu.flags() & flags::I, flags::I);
}

#[test]
fn nmi_is_serviced_regardless_of_interrupt_disable_flag() {
    let mut cpu = cpu_with_code!("SEI" "NOP" "NOP");
    cpu.mut_memory().write(0xFFFA, 0x00).unwrap();
    cpu.mut_memory().write(0xFFFB, 0xF3).unwrap();
    cpu.ticks(2).unwrap();
    cpu.pulse_nmi();
    cpu.ticks(7).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF300);
}

#[test]
fn taken_branch_suppresses_the_next_interrupt_check() {
    let mut cpu = cpu_with_code!("CLI" "LDA #0" "BEQ +2" "NOP" "NOP" "LDA #1");
    cpu.mut_memory().write(0xFFFE, 0x00).unwrap();
    cpu.mut_memory().write(0xFFFF, 0xF4).unwrap();
    cpu.ticks(2 + 2).unwrap(); // CLI, LDA #0 -> about to fetch BEQ
    cpu.tick().unwrap(); // fetch BEQ's opcode
    cpu.set_irq_line(true); // IRQ becomes pending mid-instruction
    cpu.ticks(2).unwrap(); // finish the taken branch (3 cycles total)
    assert_eq!(cpu.reg_pc(), 0xF007); // landed on LDA #1

    // The fetch that follows a taken branch doesn't re-check for a pending
    // interrupt, so LDA #1 executes normally here instead of trapping.
    cpu.ticks(2).unwrap();
    assert_eq!(cpu.reg_a(), 1);
    assert_ne!(cpu.reg_pc(), 0xF400);

    // With the latch consumed, the still-pending IRQ is recognized at the
    // next instruction boundary.
    cpu.ticks(7).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF400);
}

#[test]
fn rti_restores_flags_and_program_counter() {
    // RTI pulls P, then PCL, then PCH (in that order), so to land on a known
    // PC with known flags the pushes below go PCH, PCL, P (oldest first).
    let mut cpu = cpu_with_code!(
        "LDA #$F5" "PHA" "LDA #$00" "PHA" "LDA #$20" "PHA" "RTI"
    );
    cpu.ticks((2 + 3) * 3).unwrap();
    cpu.ticks(6).unwrap();
    assert_eq!(cpu.reg_pc(), 0xF500);
    assert_eq!(cpu.flags(), flags::UNUSED);
}

#[test]
fn hlt_opcode_halts_the_cpu() {
    let mut cpu = cpu_with_code!("NOP");
    cpu.mut_memory().write(0xF000, opcodes::HLT_02).unwrap();
    let err = cpu.tick().unwrap_err();
    assert!(matches!(err, CpuError::Halted { .. }));
    assert!(cpu.halted());
    assert!(matches!(cpu.tick().unwrap_err(), CpuError::Halted { .. }));
}

#[test]
fn slo_shifts_memory_and_ors_into_accumulator() {
    let mut cpu = cpu_with_program(&[opcodes::SLO_ZP, 0x10]);
    cpu.mut_memory().write(0x10, 0b0100_0001).unwrap();
    cpu.ticks(5).unwrap();
    assert_eq!(cpu.mut_memory().read(0x10).unwrap(), 0b1000_0010);
    assert_eq!(cpu.reg_a() & 0b1000_0010, 0b1000_0010);
}

#[test]
fn lax_loads_both_accumulator_and_x() {
    let mut cpu = cpu_with_program(&[opcodes::LAX_ZP, 0x10]);
    cpu.mut_memory().write(0x10, 0x55).unwrap();
    cpu.ticks(3).unwrap();
    assert_eq!(cpu.reg_a(), 0x55);
    assert_eq!(cpu.reg_x(), 0x55);
}

#[test]
fn sax_stores_accumulator_and_x() {
    let mut cpu = cpu_with_code!("LDA #$F0" "LDX #$0F" "SAX $10");
    cpu.ticks(2 + 2 + 3).unwrap();
    assert_eq!(cpu.mut_memory().read(0x10).unwrap(), 0);
}

#[test]
fn dcp_decrements_memory_and_compares() {
    let mut cpu = cpu_with_code!("LDA #10" "DCP $10");
    cpu.mut_memory().write(0x10, 11).unwrap();
    cpu.ticks(2 + 5).unwrap();
    assert_eq!(cpu.mut_memory().read(0x10).unwrap(), 10);
    assert_eq!(cpu.flags() & flags::Z, flags::Z);
}

#[test]
fn anc_sets_carry_from_accumulator_sign_bit() {
    let mut cpu = cpu_with_code!("LDA #$FF" "ANC #$80");
    cpu.ticks(2 + 2).unwrap();
    assert_eq!(cpu.reg_a(), 0x80);
    assert_eq!(cpu.flags() & flags::C, flags::C);
}

#[test]
fn alr_ands_then_shifts_right() {
    let mut cpu = cpu_with_code!("LDA #$FF" "ALR #$03");
    cpu.ticks(2 + 2).unwrap();
    assert_eq!(cpu.reg_a(), 0x01);
    assert_eq!(cpu.flags() & flags::C, flags::C);
}

#[test]
fn axs_subtracts_immediate_from_a_and_x() {
    let mut cpu = cpu_with_code!("LDA #$FF" "LDX #$0F" "AXS #$05");
    cpu.ticks(2 + 2 + 2).unwrap();
    assert_eq!(cpu.reg_x(), 0x0A);
    assert_eq!(cpu.flags() & flags::C, flags::C);
}

#[test]
fn rdy_line_held_low_stalls_at_instruction_boundary() {
    let mut cpu = cpu_with_code!("LDA #1" "LDA #2");
    cpu.ticks(2).unwrap();
    cpu.set_ready(false);
    let pc_before = cpu.reg_pc();
    cpu.tick().unwrap();
    cpu.tick().unwrap();
    assert_eq!(cpu.reg_pc(), pc_before);
    cpu.set_ready(true);
    cpu.ticks(2).unwrap();
    assert_eq!(cpu.reg_a(), 2);
}

/// A held-low RDY line must stall the CPU at an instruction boundary without
/// so much as a phantom read or write reaching the bus; the `Cpu<Ram>` test
/// above can only observe that the program counter doesn't move, not that the
/// bus stayed silent.
#[test]
fn rdy_held_low_performs_no_bus_cycles() {
    let mut memory = MockStalledMemory::new();
    memory.expect_read().returning(|_| Ok(0));
    memory.expect_write().returning(|_, _| Ok(()));
    let mut cpu = Cpu::new(Box::new(memory), CpuVariant::BaselineNmos);
    cpu.reset();
    cpu.ticks(8).unwrap();

    cpu.mut_memory().checkpoint();
    cpu.mut_memory().expect_read().times(0);
    cpu.mut_memory().expect_write().times(0);
    cpu.set_ready(false);
    cpu.tick().unwrap();
    cpu.tick().unwrap();
}

#[test]
fn display_formats_registers_and_flags() {
    let cpu = new_cpu(CpuVariant::BaselineNmos);
    let text = format!("{}", cpu);
    assert!(text.contains("NV-BDIZC"));
}
