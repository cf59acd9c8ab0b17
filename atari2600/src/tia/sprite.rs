//! Player, missile and ball position/drawing logic.
//!
//! Players and missiles share a 7-state drawing FSM driven by the sprite's
//! own 0..159 clock; the ball has no FSM and is simply on while its clock is
//! below its programmed width. All three kinds share the HMOVE ripple-counter
//! based fine positioning logic, implemented once in `HMove`.

/// Position within a scanline at which a sprite's drawing sequence begins,
/// for each of the 8 possible `NUSIZx` "number/size" field values. A missile
/// or player clock hitting one of its configured offsets starts a new
/// drawing sequence.
const PLAYER_OFFSETS: [&[u16]; 8] = [
    &[156],
    &[156, 12],
    &[156, 28],
    &[156, 12, 28],
    &[156, 60],
    &[156],
    &[156, 28, 60],
    &[156],
];

const MISSILE_OFFSETS: [&[u16]; 8] = [
    &[156],
    &[156, 12],
    &[156, 28],
    &[156, 12, 28],
    &[156, 60],
    &[156],
    &[156, 28, 60],
    &[156],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Stopped,
    Reset,
    Start0,
    Start1,
    Start2,
    Start3,
    Running,
}

/// Fine positioning state shared by players, missiles and the ball.
///
/// `HMOVE` arms a 4-bit ripple counter that counts down from 15 to 0 over
/// subsequent ticks; while a sprite's own latch is still armed and the chip
/// is within HBLANK, that sprite's clock advances an extra step per tick,
/// shifting it leftward. Each sprite's latch clears itself once the ripple
/// counter's value, XORed against the sprite's motion nibble (sign bit
/// flipped), reads all-ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct HMove {
    pub active: bool,
}

impl HMove {
    pub fn arm(&mut self) {
        self.active = true;
    }

    /// Called on every H1 half-clock while a motion sequence is running;
    /// `nibble_internal` is this sprite's motion nibble with its sign bit
    /// flipped, as produced by `flags::hmove_nibble_internal`.
    pub fn compare(&mut self, ripple: u8, nibble_internal: u8) {
        if self.active && (ripple ^ nibble_internal) == 0xF {
            self.active = false;
        }
    }
}

/// A player or missile, driven by the 7-state drawing FSM.
#[derive(Debug, Clone)]
pub struct Sprite {
    is_missile: bool,
    clock: u16,
    state: DrawState,
    pixel_counter: u8,
    scale_phase: u8,
    pending_reset: bool,

    pub nusiz: u8,
    pub reflect: bool,
    pub hmove: HMove,

    /// Bitmap graphics; only meaningful for players. `[0]` is the latest
    /// value written to `GRPx`, `[1]` is the value latched in on the
    /// following player's `GRPx` write, used when vertical delay is active.
    graphics: [u8; 2],
    pub vertical_delay: bool,
}

impl Sprite {
    pub fn new(is_missile: bool) -> Sprite {
        Sprite {
            is_missile,
            clock: 0,
            state: DrawState::Stopped,
            pixel_counter: 0,
            scale_phase: 0,
            pending_reset: false,
            nusiz: 0,
            reflect: false,
            hmove: HMove::default(),
            graphics: [0, 0],
            vertical_delay: false,
        }
    }

    pub fn set_graphics_new(&mut self, value: u8) {
        self.graphics[1] = self.graphics[0];
        self.graphics[0] = value;
    }

    pub fn clock(&self) -> u16 {
        self.clock
    }

    /// Snaps this sprite's clock to another's, used by `RESMPx` to lock a
    /// missile onto its player's center.
    pub fn align_to(&mut self, other_clock: u16) {
        self.clock = other_clock;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        // Missiles and the ball use a single-bit "graphics" register; model
        // it the same way as the 8-bit player shape so `current_bit` doesn't
        // need to special-case it.
        self.graphics[0] = if enabled { 0xFF } else { 0 };
    }

    fn offsets(&self) -> &'static [u16] {
        if self.is_missile {
            MISSILE_OFFSETS[(self.nusiz & 0b111) as usize]
        } else {
            PLAYER_OFFSETS[(self.nusiz & 0b111) as usize]
        }
    }

    fn scale(&self) -> u8 {
        if self.is_missile {
            return 1;
        }
        match self.nusiz & 0b111 {
            0b101 => 2,
            0b111 => 4,
            _ => 1,
        }
    }

    /// Requests a reset strobe (`RESPx`/`RESMx`/`RESBL`). Takes effect at the
    /// end of the current tick, matching the real chip's behavior of
    /// snapping the sprite to the next visible pixel rather than the one
    /// being drawn when the strobe was written.
    pub fn strobe_reset(&mut self) {
        self.pending_reset = true;
    }

    /// Advances the sprite by one pixel clock. `visible` is false during
    /// HBLANK, except when an active HMOVE latch forces extra ticks there.
    /// Returns whether this sprite is drawing a lit pixel this clock.
    pub fn tick(&mut self, visible: bool) -> bool {
        if self.pending_reset {
            self.pending_reset = false;
            self.clock = 0;
            self.state = DrawState::Reset;
        }

        if !visible {
            return matches!(self.state, DrawState::Running) && self.current_bit();
        }

        match self.state {
            DrawState::Stopped => {
                if self.offsets().contains(&self.clock) {
                    self.state = if self.is_missile {
                        DrawState::Start1
                    } else {
                        DrawState::Start0
                    };
                }
            }
            DrawState::Reset => self.state = DrawState::Stopped,
            DrawState::Start0 => self.state = DrawState::Start1,
            DrawState::Start1 => self.state = DrawState::Start2,
            DrawState::Start2 => self.state = DrawState::Start3,
            DrawState::Start3 => {
                self.state = DrawState::Running;
                self.pixel_counter = 0;
                self.scale_phase = 0;
            }
            DrawState::Running => {
                self.scale_phase += 1;
                if self.scale_phase >= self.scale() {
                    self.scale_phase = 0;
                    self.pixel_counter += 1;
                    if self.pixel_counter >= 8 {
                        self.state = DrawState::Stopped;
                    }
                }
            }
        }

        let on = matches!(self.state, DrawState::Running) && self.current_bit();
        self.clock = (self.clock + 1) % 160;
        on
    }

    fn current_bit(&self) -> bool {
        if self.is_missile {
            // A missile's "shape" is simply active for its configured width
            // out of the 8 clocks of the Running state.
            let width = crate::tia::flags::width_from_field(self.nusiz >> 4);
            return self.pixel_counter < width;
        }
        let bitmap = if self.vertical_delay {
            self.graphics[1]
        } else {
            self.graphics[0]
        };
        let bit_index = if self.reflect {
            self.pixel_counter
        } else {
            7 - self.pixel_counter
        };
        bitmap & (1 << bit_index) != 0
    }
}

/// The ball, a featureless 1/2/4/8-pixel-wide sprite with no FSM: it's simply
/// on for as long as its own clock is below the configured width.
#[derive(Debug, Clone, Default)]
pub struct Ball {
    clock: u16,
    pending_reset: bool,
    pub width: u8,
    pub hmove: HMove,
    enabled: [bool; 2],
    pub vertical_delay: bool,
}

impl Ball {
    pub fn new() -> Ball {
        Ball {
            clock: 0,
            pending_reset: false,
            width: 1,
            hmove: HMove::default(),
            enabled: [false, false],
            vertical_delay: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled[1] = self.enabled[0];
        self.enabled[0] = enabled;
    }

    pub fn strobe_reset(&mut self) {
        self.pending_reset = true;
    }

    pub fn tick(&mut self, visible: bool) -> bool {
        if self.pending_reset {
            self.pending_reset = false;
            self.clock = 0;
        }
        let enabled = if self.vertical_delay {
            self.enabled[1]
        } else {
            self.enabled[0]
        };
        let on = enabled && self.clock < self.width as u16;
        if visible {
            self.clock = (self.clock + 1) % 160;
        }
        on
    }
}
