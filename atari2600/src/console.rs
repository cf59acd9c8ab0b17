//! The platform controller: wires the CPU, PIA/RIOT and TIA together onto
//! one 13-bit bus and drives them at the right relative clock rates.

use crate::address_space::AddressSpace;
use crate::colors::{self, Palette};
use crate::error::InitError;
use crate::memory::{self, AtariRam, AtariRom};
use crate::riot;
use crate::riot::Riot;
use crate::tia;
use crate::tia::{PlayerIndex, Tia, TvStandard};
use enum_map::{enum_map, Enum, EnumMap};
use image::RgbaImage;
use std::error;
use ya6502::cpu::{Cpu, CpuVariant};

pub type ConsoleAddressSpace = AddressSpace<Tia, AtariRam, Riot, AtariRom>;

/// Configuration accepted by [`Console::new`]. A handful of independent
/// knobs, defaulted sensibly, applied all at once at construction time.
///
/// `*_joystick`/`*_paddles` are independent booleans, not an enum, because
/// the two wiring checks genuinely are independent on real hardware except
/// for one case: a single port can't be both at once, which `new` rejects.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub tv_standard: TvStandard,
    pub cpu_variant: CpuVariant,
    pub left_joystick: bool,
    pub left_paddles: bool,
    pub right_joystick: bool,
    pub right_paddles: bool,
    pub trace: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            tv_standard: TvStandard::Ntsc,
            cpu_variant: CpuVariant::BaselineNmos,
            left_joystick: true,
            left_paddles: false,
            right_joystick: true,
            right_paddles: false,
            trace: false,
        }
    }
}

fn palette_for(tv_standard: TvStandard) -> Palette {
    match tv_standard {
        TvStandard::Ntsc => colors::ntsc_palette(),
        TvStandard::Pal => colors::pal_palette(),
        TvStandard::Secam => colors::secam_palette(),
    }
}

pub struct Console {
    cpu: Cpu<ConsoleAddressSpace>,
    config: ConsoleConfig,
    switch_positions: EnumMap<Switch, SwitchPosition>,
    joysticks: EnumMap<JoystickPort, Joystick>,
}

impl Console {
    /// Builds a console around a cartridge image. Refuses the configuration
    /// if the ROM is neither 2K nor 4K, or if either port is asked to be
    /// both a joystick and a paddle pair at once.
    pub fn new(rom_bytes: &[u8], config: ConsoleConfig) -> Result<Console, InitError> {
        if (config.left_joystick && config.left_paddles) || (config.right_joystick && config.right_paddles) {
            return Err(InitError::ConflictingInputConfiguration);
        }
        let rom = memory::new_rom(rom_bytes)?;
        let address_space = ConsoleAddressSpace {
            tia: Tia::new(config.tv_standard, palette_for(config.tv_standard)),
            ram: AtariRam::new(),
            riot: Riot::new(),
            rom,
        };
        let mut console = Console {
            cpu: Cpu::new(Box::new(address_space), config.cpu_variant),
            config,
            switch_positions: enum_map! { _ => SwitchPosition::Up },
            joysticks: enum_map! { _ => Joystick::new() },
        };
        console.update_switches_riot_port();
        console.update_joystick_ports();
        Ok(console)
    }

    pub fn cpu(&self) -> &Cpu<ConsoleAddressSpace> {
        &self.cpu
    }

    fn mut_tia(&mut self) -> &mut Tia {
        &mut self.cpu.mut_memory().tia
    }

    fn mut_riot(&mut self) -> &mut Riot {
        &mut self.cpu.mut_memory().riot
    }

    pub fn set_frame_callback(&mut self, callback: Box<dyn FnMut(&RgbaImage)>) {
        self.mut_tia().frame_callback = Some(callback);
    }

    /// Advances the system by one CPU cycle's worth of time: three TIA color
    /// clocks. The TIA draws its first pixel of the three on the old
    /// register values, then the CPU and PIA take their single cycle
    /// (possibly writing into a shadow register), then the TIA latches
    /// shadow into current before drawing its remaining two pixels. A store
    /// issued on CPU cycle N is visible starting with the pixel produced on
    /// TIA cycle 3N+1, not 3N+3.
    pub fn tick(&mut self) -> Result<(), Box<dyn error::Error>> {
        self.mut_tia().tick();
        let ready = !self.mut_tia().rdy();
        self.cpu.set_ready(ready);
        if ready {
            self.cpu.tick()?;
            self.mut_riot().tick();
        }
        self.mut_tia().tick_done();

        self.mut_tia().tick();
        self.mut_tia().tick_done();

        self.mut_tia().tick();
        self.mut_tia().tick_done();

        if self.config.trace {
            eprintln!("{:04X}: A={:02X}", self.cpu.reg_pc(), self.cpu.reg_a());
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Box<dyn error::Error>> {
        self.cpu.reset();
        for _ in 0..8 {
            self.tick()?;
        }
        Ok(())
    }

    pub fn switch_position(&self, switch: Switch) -> SwitchPosition {
        self.switch_positions[switch]
    }

    pub fn flip_switch(&mut self, switch: Switch, position: SwitchPosition) {
        self.switch_positions[switch] = position;
        self.update_switches_riot_port();
    }

    fn update_switches_riot_port(&mut self) {
        let port_value = self
            .switch_positions
            .iter()
            .map(|(switch, pos)| switch.port_value_when(*pos))
            .fold(0b0011_0100, |acc, item| acc | item);
        self.mut_riot().set_port(riot::Port::PB, port_value);
    }

    pub fn set_joystick_input_state(&mut self, port: JoystickPort, input: JoystickInput, state: bool) {
        self.joysticks[port].set_state(input, state);
        self.update_joystick_ports();
    }

    fn update_joystick_ports(&mut self) {
        let (left_dir_port, left_fire_port) = self.joysticks[JoystickPort::Left].port_values();
        let (right_dir_port, right_fire_port) = self.joysticks[JoystickPort::Right].port_values();
        self.mut_riot()
            .set_port(riot::Port::PA, (left_dir_port << 4) | right_dir_port);
        self.mut_tia()
            .set_joystick_buttons(PlayerIndex::Zero, !left_fire_port);
        self.mut_tia()
            .set_joystick_buttons(PlayerIndex::One, !right_fire_port);
    }

    pub fn set_paddle_position(&mut self, channel: usize, position: f64) {
        self.mut_tia().set_paddle_position(channel, position);
    }
}

#[derive(Debug, Copy, Clone, Enum)]
pub enum Switch {
    TvType,
    LeftDifficulty,
    RightDifficulty,
    GameSelect,
    GameReset,
}

impl Switch {
    fn port_value_when(&self, position: SwitchPosition) -> u8 {
        match position {
            SwitchPosition::Down => 0,
            SwitchPosition::Up => match self {
                Self::RightDifficulty => 1 << 7,
                Self::LeftDifficulty => 1 << 6,
                Self::TvType => 1 << 3,
                Self::GameSelect => 1 << 1,
                Self::GameReset => 1,
            },
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SwitchPosition {
    Up,
    Down,
}

impl std::ops::Not for SwitchPosition {
    type Output = SwitchPosition;
    fn not(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

#[derive(Enum)]
pub enum JoystickInput {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl JoystickInput {
    fn port_mask(&self) -> u8 {
        match *self {
            Self::Up => 1,
            Self::Down => 1 << 1,
            Self::Left => 1 << 2,
            Self::Right => 1 << 3,
            Self::Fire => 0,
        }
    }
    fn opposite(&self) -> Self {
        match *self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Fire => Self::Fire,
        }
    }
}

struct Joystick {
    direction_port: u8,
    fire_port: bool,
}

impl Joystick {
    fn new() -> Self {
        Joystick {
            direction_port: 0b1111,
            fire_port: true,
        }
    }

    fn set_state(&mut self, input: JoystickInput, state: bool) {
        match input {
            JoystickInput::Fire => self.fire_port = !state,
            _ => {
                if state {
                    self.direction_port &= !input.port_mask();
                    self.direction_port |= input.opposite().port_mask();
                } else {
                    self.direction_port |= input.port_mask();
                }
            }
        };
    }

    fn port_values(&self) -> (u8, bool) {
        (self.direction_port, self.fire_port)
    }
}

#[derive(Enum)]
pub enum JoystickPort {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ya6502::memory::Read;

    fn blank_rom(size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    #[test]
    fn rejects_illegal_rom_size() {
        let result = Console::new(&blank_rom(100), ConsoleConfig::default());
        assert!(matches!(result, Err(InitError::IllegalRomSize { size: 100 })));
    }

    #[test]
    fn rejects_joystick_and_paddles_on_the_same_port() {
        let config = ConsoleConfig {
            left_joystick: true,
            left_paddles: true,
            ..ConsoleConfig::default()
        };
        let result = Console::new(&blank_rom(2048), config);
        assert_eq!(result.err(), Some(InitError::ConflictingInputConfiguration));
    }

    #[test]
    fn accepts_4k_rom() {
        let console = Console::new(&blank_rom(4096), ConsoleConfig::default());
        assert!(console.is_ok());
    }

    #[test]
    fn reset_runs_without_error() {
        let mut console = Console::new(&blank_rom(2048), ConsoleConfig::default()).unwrap();
        assert!(console.reset().is_ok());
    }

    #[test]
    fn switches_affect_riot_port_b() {
        let mut console = Console::new(&blank_rom(2048), ConsoleConfig::default()).unwrap();
        console.flip_switch(Switch::GameReset, SwitchPosition::Down);
        // No panic, and the switch position round-trips.
        assert_eq!(console.switch_position(Switch::GameReset), SwitchPosition::Down);
    }

    #[test]
    fn joystick_fire_reaches_tia_input_lines() {
        let mut console = Console::new(&blank_rom(2048), ConsoleConfig::default()).unwrap();
        console.set_joystick_input_state(JoystickPort::Left, JoystickInput::Fire, true);
        assert_eq!(console.mut_tia().read(tia::registers::INPT4).unwrap(), 0);
    }

    /// A 4K ROM whose first bytes are `program`, with the reset vector
    /// pointing at `$F000` (the first byte of that window).
    fn rom_with_program(program: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 4096];
        rom[..program.len()].copy_from_slice(program);
        rom[0xFFC] = 0x00;
        rom[0xFFD] = 0xF0;
        rom
    }

    #[test]
    fn cpu_write_is_visible_to_the_very_next_pixel_not_two_later() {
        let mut program = vec![0xEA; 6]; // NOP x6
        program.push(0xA9); // LDA #$1E
        program.push(0x1E);
        program.push(0x85); // STA COLUBK
        program.push(tia::registers::COLUBK as u8);

        let mut console = Console::new(&rom_with_program(&program), ConsoleConfig::default()).unwrap();
        console.reset().unwrap();

        // Burn every cycle up to, but not including, STA's write cycle: six
        // NOPs (2 cycles each) plus LDA (2 cycles) plus STA's opcode and
        // operand fetches (1 cycle each).
        for _ in 0..(12 + 2 + 2) {
            console.tick().unwrap();
        }

        let v_line = console.mut_tia().v_line() as u32;
        let h_before_write = console.mut_tia().h_clock() as u32;
        let old_color = *console.mut_tia().frame().get_pixel(h_before_write - 1, v_line);

        // This tick performs STA's write cycle: one TIA pixel still drawn
        // from the pre-write value, then the latch, then two pixels drawn
        // from the new one.
        console.tick().unwrap();

        let pixel_on_write_cycle = *console.mut_tia().frame().get_pixel(h_before_write, v_line);
        let pixel_right_after = *console.mut_tia().frame().get_pixel(h_before_write + 1, v_line);

        assert_eq!(
            pixel_on_write_cycle, old_color,
            "the pixel drawn on the CPU's own write cycle must still reflect the pre-write value"
        );
        assert_ne!(
            pixel_right_after, old_color,
            "the pixel drawn immediately after must already reflect the write"
        );
    }
}
