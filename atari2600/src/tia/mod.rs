//! The Television Interface Adaptor: video and audio generation.
//!
//! The TIA is driven one pixel clock at a time by `tick()`, followed by
//! `tick_done()` once the CPU and PIA have had their turn on that clock.
//! Splitting the two lets a register write land in between: it's latched
//! by `tick_done()` and is visible starting with the pixel `tick()` draws
//! next, not one clock later. Unlike the CPU and PIA, which only care about
//! 1/3 of those clocks, the TIA owns the raster image outright: every tick
//! paints exactly one pixel (blanked or not) into its internal frame buffer,
//! and `frame_callback` fires the moment a vertical sync pulse begins,
//! handing the caller the just-finished frame.

mod audio;
pub mod flags;
pub mod registers;
mod sprite;

use crate::colors::Palette;
use image::{Rgba, RgbaImage};
use std::fmt;
use ya6502::memory::{Memory, Read, ReadResult, Write, WriteResult};

pub use audio::{AudioGenerator, Style as AudioStyle};
pub use sprite::{Ball, DrawState, Sprite};

/// Color clock at which the horizontal sync pulse begins.
pub const HSYNC_START: u16 = 16;
/// Color clock at which the horizontal sync pulse ends.
pub const HSYNC_END: u16 = 32;
/// Width, in color clocks, of the horizontal blanking interval under normal
/// circumstances.
pub const HBLANK_WIDTH: u16 = 68;
/// Width of the horizontal blanking interval on a scanline where `HMOVE` was
/// struck late, producing the "comb" effect along the screen's left edge.
pub const HBLANK_EXTENDED_WIDTH: u16 = 76;
/// Number of visible pixels per scanline.
pub const FRAME_WIDTH: u16 = 160;
/// Total color clocks per scanline, visible or not.
pub const TOTAL_WIDTH: u16 = 228;

/// Selects the scanline and vertical sync geometry the TIA generates. PAL
/// and SECAM TIAs are electrically almost identical; they're told apart here
/// purely to pick the right color decoding in [`crate::colors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvStandard {
    Ntsc,
    Pal,
    Secam,
}

impl TvStandard {
    fn total_scanlines(self) -> u16 {
        match self {
            TvStandard::Ntsc => 262,
            TvStandard::Pal | TvStandard::Secam => 312,
        }
    }
}

/// A register value that's written into a shadow copy and only takes effect
/// on the following tick, mirroring the real chip's latching behavior for
/// most of its write-only registers (colors, playfield data, `CTRLPF`).
#[derive(Debug, Clone, Copy, Default)]
struct Shadowed<T: Copy + Default> {
    current: T,
    shadow: T,
}

impl<T: Copy + Default> Shadowed<T> {
    fn write(&mut self, value: T) {
        self.shadow = value;
    }

    fn latch(&mut self) {
        self.current = self.shadow;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Collisions {
    cxm0p: u8,
    cxm1p: u8,
    cxp0fb: u8,
    cxp1fb: u8,
    cxm0fb: u8,
    cxm1fb: u8,
    cxblpf: u8,
    cxppmm: u8,
}

impl Collisions {
    fn clear(&mut self) {
        *self = Collisions::default();
    }
}

/// A single paddle's RC charge circuit, feeding `INPTx`.
#[derive(Debug, Clone, Copy, Default)]
struct Paddle {
    charge: u32,
    threshold: u32,
}

impl Paddle {
    /// Sets the simulated wiper position, 0.0 (minimum resistance, fast
    /// charge) to 1.0 (maximum resistance, slow charge).
    fn set_position(&mut self, position: f64) {
        let position = position.clamp(0.0, 1.0);
        self.threshold = 400 + (position * 380_000.0) as u32;
    }

    fn tick(&mut self, dumped: bool) {
        if dumped {
            self.charge = 0;
        } else if self.charge < self.threshold {
            self.charge += 1;
        }
    }

    fn is_high(&self) -> bool {
        self.charge >= self.threshold
    }
}

/// Indices into the `players`/`missiles`/`audio` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerIndex {
    Zero = 0,
    One = 1,
}

pub struct Tia {
    tv_standard: TvStandard,
    palette: Palette,

    h_clock: u16,
    v_line: u16,
    line_hblank_extended: bool,
    column: u16,

    vsync: bool,
    vblank: u8,
    rdy: bool,

    hmove_pending: bool,
    hmove_running: bool,
    hmove_ripple: u8,

    players: [Sprite; 2],
    missiles: [Sprite; 2],
    ball: Ball,

    pf0: Shadowed<u8>,
    pf1: Shadowed<u8>,
    pf2: Shadowed<u8>,
    ctrlpf: Shadowed<u8>,
    forward_pattern: u32,
    reflected_pattern: u32,

    colup0: Shadowed<u8>,
    colup1: Shadowed<u8>,
    colupf: Shadowed<u8>,
    colubk: Shadowed<u8>,

    hmp0: u8,
    hmp1: u8,
    hmm0: u8,
    hmm1: u8,
    hmbl: u8,

    collisions: Collisions,
    audio: [AudioGenerator; 2],
    paddles: [Paddle; 4],
    input4: bool,
    input5: bool,

    frame: RgbaImage,
    pub frame_callback: Option<Box<dyn FnMut(&RgbaImage)>>,
}

impl Tia {
    pub fn new(tv_standard: TvStandard, palette: Palette) -> Tia {
        let frame = RgbaImage::new(TOTAL_WIDTH as u32, tv_standard.total_scanlines() as u32);
        Tia {
            tv_standard,
            palette,
            h_clock: 0,
            v_line: 0,
            line_hblank_extended: false,
            column: 0,
            vsync: false,
            vblank: 0,
            rdy: false,
            hmove_pending: false,
            hmove_running: false,
            hmove_ripple: 0,
            players: [Sprite::new(false), Sprite::new(false)],
            missiles: [Sprite::new(true), Sprite::new(true)],
            ball: Ball::new(),
            pf0: Shadowed::default(),
            pf1: Shadowed::default(),
            pf2: Shadowed::default(),
            ctrlpf: Shadowed::default(),
            forward_pattern: 0,
            reflected_pattern: 0,
            colup0: Shadowed::default(),
            colup1: Shadowed::default(),
            colupf: Shadowed::default(),
            colubk: Shadowed::default(),
            hmp0: 0,
            hmp1: 0,
            hmm0: 0,
            hmm1: 0,
            hmbl: 0,
            collisions: Collisions::default(),
            audio: [AudioGenerator::new(), AudioGenerator::new()],
            paddles: [Paddle::default(); 4],
            input4: false,
            input5: false,
            frame,
            frame_callback: None,
        }
    }

    /// Whether the CPU (and PIA) should be held at bay this color clock;
    /// true from the tick a `WSYNC` write lands until the end of the current
    /// scanline.
    pub fn rdy(&self) -> bool {
        self.rdy
    }

    /// Color clock position within the current scanline, 0..`TOTAL_WIDTH`.
    pub fn h_clock(&self) -> u16 {
        self.h_clock
    }

    /// Index of the scanline currently being drawn.
    pub fn v_line(&self) -> u16 {
        self.v_line
    }

    /// The raster buffer as painted so far this frame.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Returns the two channels' instantaneous audio samples, scaled 0..15.
    pub fn audio_sample(&mut self) -> (u8, u8) {
        (self.audio[0].tick(), self.audio[1].tick())
    }

    pub fn set_joystick_buttons(&mut self, player: PlayerIndex, pressed: bool) {
        // A pressed button pulls the line low; INPT4/5 read high when open.
        match player {
            PlayerIndex::Zero => self.input4 = !pressed,
            PlayerIndex::One => self.input5 = !pressed,
        }
    }

    pub fn set_paddle_position(&mut self, channel: usize, position: f64) {
        self.paddles[channel].set_position(position);
    }

    fn recompute_playfield_patterns(&mut self) {
        let pf0 = self.pf0.current;
        let pf1 = self.pf1.current;
        let pf2 = self.pf2.current;
        let mut forward = 0u32;
        for i in 0..20u32 {
            let bit = match i {
                0..=3 => pf0 & (1 << (4 + i)) != 0,
                4..=11 => pf1 & (1 << (11 - i)) != 0,
                _ => pf2 & (1 << (i - 12)) != 0,
            };
            if bit {
                forward |= 1 << i;
            }
        }
        let mut reflected = 0u32;
        for i in 0..20u32 {
            if forward & (1 << (19 - i)) != 0 {
                reflected |= 1 << i;
            }
        }
        self.forward_pattern = forward;
        self.reflected_pattern = reflected;
    }

    fn playfield_bit(&self) -> bool {
        let group = (self.column / 4) as u32;
        if group < 20 {
            self.forward_pattern & (1 << group) != 0
        } else {
            let g = group - 20;
            let pattern = if self.ctrlpf.current & flags::CTRLPF_REFLECT != 0 {
                self.reflected_pattern
            } else {
                self.forward_pattern
            };
            pattern & (1 << g) != 0
        }
    }

    fn color_pixel(&self, code: u8) -> Rgba<u8> {
        self.palette[(code & 0xFF) as usize % self.palette.len()]
    }

    /// Advances the chip by exactly one color clock, producing one pixel of
    /// output (visible or blanked) from the current (already-latched)
    /// register values. Does not latch shadow registers written since the
    /// last call; the caller is expected to call `tick_done()` once it's
    /// done giving the CPU and PIA their turn.
    pub fn tick(&mut self) {
        if self.h_clock == 0 {
            self.rdy = false;
            self.line_hblank_extended = false;
        }

        let hblank_width = if self.line_hblank_extended {
            HBLANK_EXTENDED_WIDTH
        } else {
            HBLANK_WIDTH
        };
        let in_hblank = self.h_clock < hblank_width;
        let visible = !in_hblank;

        // HMOVE ripple counter: H1 on even clocks, H2 on odd.
        if self.h_clock % 2 == 0 {
            if self.hmove_pending {
                self.hmove_pending = false;
                self.hmove_running = true;
                self.hmove_ripple = 15;
                self.players[0].hmove.arm();
                self.players[1].hmove.arm();
                self.missiles[0].hmove.arm();
                self.missiles[1].hmove.arm();
                self.ball.hmove.arm();
            }
            if self.hmove_running {
                self.players[0]
                    .hmove
                    .compare(self.hmove_ripple, flags::hmove_nibble_internal(self.hmp0));
                self.players[1]
                    .hmove
                    .compare(self.hmove_ripple, flags::hmove_nibble_internal(self.hmp1));
                self.missiles[0]
                    .hmove
                    .compare(self.hmove_ripple, flags::hmove_nibble_internal(self.hmm0));
                self.missiles[1]
                    .hmove
                    .compare(self.hmove_ripple, flags::hmove_nibble_internal(self.hmm1));
                self.ball
                    .hmove
                    .compare(self.hmove_ripple, flags::hmove_nibble_internal(self.hmbl));
            }
        } else if self.hmove_running && self.hmove_ripple > 0 {
            self.hmove_ripple -= 1;
        }

        let p0_advance = if in_hblank { self.players[0].hmove.active } else { true };
        let p1_advance = if in_hblank { self.players[1].hmove.active } else { true };
        let m0_advance = if in_hblank { self.missiles[0].hmove.active } else { true };
        let m1_advance = if in_hblank { self.missiles[1].hmove.active } else { true };
        let bl_advance = if in_hblank { self.ball.hmove.active } else { true };

        let p0_on = self.players[0].tick(p0_advance);
        let p1_on = self.players[1].tick(p1_advance);
        let m0_on = self.missiles[0].tick(m0_advance);
        let m1_on = self.missiles[1].tick(m1_advance);
        let bl_on = self.ball.tick(bl_advance);

        if visible {
            let pf_on = self.playfield_bit();

            if pf_on || p0_on || p1_on || m0_on || m1_on || bl_on {
                if m0_on && p1_on {
                    self.collisions.cxm0p |= 0x80;
                }
                if m0_on && p0_on {
                    self.collisions.cxm0p |= 0x40;
                }
                if m1_on && p0_on {
                    self.collisions.cxm1p |= 0x80;
                }
                if m1_on && p1_on {
                    self.collisions.cxm1p |= 0x40;
                }
                if p0_on && pf_on {
                    self.collisions.cxp0fb |= 0x80;
                }
                if p0_on && bl_on {
                    self.collisions.cxp0fb |= 0x40;
                }
                if p1_on && pf_on {
                    self.collisions.cxp1fb |= 0x80;
                }
                if p1_on && bl_on {
                    self.collisions.cxp1fb |= 0x40;
                }
                if m0_on && pf_on {
                    self.collisions.cxm0fb |= 0x80;
                }
                if m0_on && bl_on {
                    self.collisions.cxm0fb |= 0x40;
                }
                if m1_on && pf_on {
                    self.collisions.cxm1fb |= 0x80;
                }
                if m1_on && bl_on {
                    self.collisions.cxm1fb |= 0x40;
                }
                if bl_on && pf_on {
                    self.collisions.cxblpf |= 0x80;
                }
                if p0_on && p1_on {
                    self.collisions.cxppmm |= 0x80;
                }
                if m0_on && m1_on {
                    self.collisions.cxppmm |= 0x40;
                }
            }

            let playfield_priority = self.ctrlpf.current & flags::CTRLPF_PRIORITY != 0;
            let score_mode = self.ctrlpf.current & flags::CTRLPF_SCORE != 0;
            let pf_color = if score_mode {
                if self.column < FRAME_WIDTH / 2 {
                    self.colup0.current
                } else {
                    self.colup1.current
                }
            } else {
                self.colupf.current
            };

            let code = if self.vsync || self.vblank & flags::VBLANK_ON != 0 {
                0
            } else if playfield_priority && (pf_on || bl_on) {
                pf_color
            } else if p0_on || m0_on {
                self.colup0.current
            } else if p1_on || m1_on {
                self.colup1.current
            } else if pf_on || bl_on {
                pf_color
            } else {
                self.colubk.current
            };

            let pixel = self.color_pixel(code);
            self.frame.put_pixel(self.h_clock as u32, self.v_line as u32, pixel);

            self.column = (self.column + 1) % FRAME_WIDTH;
        } else {
            self.frame
                .put_pixel(self.h_clock as u32, self.v_line as u32, Rgba([0, 0, 0, 0xFF]));
        }

        let dumped = self.vblank & 0b1000_0000 != 0;
        for paddle in self.paddles.iter_mut() {
            paddle.tick(dumped);
        }

        self.h_clock += 1;
        if self.h_clock >= TOTAL_WIDTH {
            self.h_clock = 0;
            self.v_line += 1;
            if self.v_line >= self.tv_standard.total_scanlines() {
                self.v_line = 0;
            }
        }
    }

    /// Latches every shadow register written since the last call into its
    /// current copy. The platform controller calls this after `tick()` and
    /// after the CPU/PIA have had their turn, so that a register write made
    /// during that turn becomes visible starting with the very next pixel
    /// rather than the one after it.
    pub fn tick_done(&mut self) {
        self.pf0.latch();
        self.pf1.latch();
        self.pf2.latch();
        self.ctrlpf.latch();
        self.colup0.latch();
        self.colup1.latch();
        self.colupf.latch();
        self.colubk.latch();
        self.recompute_playfield_patterns();
    }

    fn on_vsync_write(&mut self, value: u8) {
        let new_vsync = value & flags::VSYNC_ON != 0;
        if !self.vsync && new_vsync {
            if let Some(callback) = self.frame_callback.as_mut() {
                callback(&self.frame);
            }
        }
        self.vsync = new_vsync;
    }
}

impl Read for Tia {
    fn read(&mut self, address: u16) -> ReadResult {
        use registers::*;
        let value = match address & READ_ADDRESS_MASK {
            CXM0P => self.collisions.cxm0p,
            CXM1P => self.collisions.cxm1p,
            CXP0FB => self.collisions.cxp0fb,
            CXP1FB => self.collisions.cxp1fb,
            CXM0FB => self.collisions.cxm0fb,
            CXM1FB => self.collisions.cxm1fb,
            CXBLPF => self.collisions.cxblpf,
            CXPPMM => self.collisions.cxppmm,
            INPT0 => {
                if self.paddles[0].is_high() {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            INPT1 => {
                if self.paddles[1].is_high() {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            INPT2 => {
                if self.paddles[2].is_high() {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            INPT3 => {
                if self.paddles[3].is_high() {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            INPT4 => {
                if self.input4 {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            INPT5 => {
                if self.input5 {
                    flags::INPUT_HIGH
                } else {
                    0
                }
            }
            _ => 0,
        };
        Ok(value)
    }
}

impl Write for Tia {
    fn write(&mut self, address: u16, value: u8) -> WriteResult {
        use registers::*;
        match address & WRITE_ADDRESS_MASK {
            VSYNC => self.on_vsync_write(value),
            VBLANK => self.vblank = value,
            WSYNC => self.rdy = true,
            RSYNC => self.h_clock = TOTAL_WIDTH - 1,
            NUSIZ0 => {
                self.players[0].nusiz = value;
                self.missiles[0].nusiz = value;
            }
            NUSIZ1 => {
                self.players[1].nusiz = value;
                self.missiles[1].nusiz = value;
            }
            COLUP0 => self.colup0.write(value),
            COLUP1 => self.colup1.write(value),
            COLUPF => self.colupf.write(value),
            COLUBK => self.colubk.write(value),
            CTRLPF => {
                self.ctrlpf.write(value);
                self.ball.width = flags::width_from_field((value & flags::CTRLPF_BALL_WIDTH_MASK) >> 4);
            }
            REFP0 => self.players[0].reflect = value & flags::REFPX_REFLECT != 0,
            REFP1 => self.players[1].reflect = value & flags::REFPX_REFLECT != 0,
            PF0 => self.pf0.write(value),
            PF1 => self.pf1.write(value),
            PF2 => self.pf2.write(value),
            RESP0 => self.players[0].strobe_reset(),
            RESP1 => self.players[1].strobe_reset(),
            RESM0 => self.missiles[0].strobe_reset(),
            RESM1 => self.missiles[1].strobe_reset(),
            RESBL => self.ball.strobe_reset(),
            AUDC0 => self.audio[0].set_control(value),
            AUDC1 => self.audio[1].set_control(value),
            AUDF0 => self.audio[0].set_frequency_divider(value),
            AUDF1 => self.audio[1].set_frequency_divider(value),
            AUDV0 => self.audio[0].volume = value & 0xF,
            AUDV1 => self.audio[1].volume = value & 0xF,
            GRP0 => self.players[0].set_graphics_new(value),
            GRP1 => self.players[1].set_graphics_new(value),
            ENAM0 => self.missiles[0].set_enabled(value & flags::ENAXX_ENABLE != 0),
            ENAM1 => self.missiles[1].set_enabled(value & flags::ENAXX_ENABLE != 0),
            ENABL => self.ball.set_enabled(value & flags::ENAXX_ENABLE != 0),
            HMP0 => self.hmp0 = value,
            HMP1 => self.hmp1 = value,
            HMM0 => self.hmm0 = value,
            HMM1 => self.hmm1 = value,
            HMBL => self.hmbl = value,
            VDELP0 => self.players[0].vertical_delay = value & flags::VDELXX_ON != 0,
            VDELP1 => self.players[1].vertical_delay = value & flags::VDELXX_ON != 0,
            VDELBL => self.ball.vertical_delay = value & flags::VDELXX_ON != 0,
            // Locks the missile to its player's center. Real hardware keeps
            // tracking the player continuously while the bit stays set; this
            // only snaps once, on the write.
            RESMP0 => {
                if value & flags::RESMPX_RESET != 0 {
                    let clock = self.players[0].clock();
                    self.missiles[0].align_to(clock);
                }
            }
            RESMP1 => {
                if value & flags::RESMPX_RESET != 0 {
                    let clock = self.players[1].clock();
                    self.missiles[1].align_to(clock);
                }
            }
            HMOVE => {
                self.hmove_pending = true;
                // A late strike (close to or past the normal end of
                // blanking) extends this line's HBLANK by 8 pixels, the
                // "comb" artifact visible along the left edge.
                if self.h_clock >= HBLANK_WIDTH - 8 {
                    self.line_hblank_extended = true;
                }
            }
            HMCLR => {
                self.hmp0 = 0;
                self.hmp1 = 0;
                self.hmm0 = 0;
                self.hmm1 = 0;
                self.hmbl = 0;
            }
            CXCLR => self.collisions.clear(),
            _ => {}
        }
        Ok(())
    }
}

impl Memory for Tia {
    fn power_on(&mut self) {
        self.h_clock = 0;
        self.v_line = 0;
        self.vsync = false;
        self.vblank = 0;
        self.rdy = false;
        self.collisions.clear();
    }
}

impl fmt::Debug for Tia {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Tia")
            .field("h_clock", &self.h_clock)
            .field("v_line", &self.v_line)
            .field("vsync", &self.vsync)
            .field("vblank", &self.vblank)
            .finish()
    }
}

#[cfg(test)]
mod tests;
