#![cfg(test)]

use super::*;
use crate::colors::ntsc_palette;

fn new_tia() -> Tia {
    Tia::new(TvStandard::Ntsc, ntsc_palette())
}

/// Advances one whole color clock: pixel, then the shadow-register latch
/// that in `Console` would otherwise be sandwiched around the CPU/PIA's
/// cycle. Tests that don't care about that interleaving use this instead of
/// calling `tick()` and `tick_done()` separately.
fn step(tia: &mut Tia) {
    tia.tick();
    tia.tick_done();
}

fn run_to_column(tia: &mut Tia, column: u16) {
    while tia.h_clock != HBLANK_WIDTH + column {
        step(tia);
    }
}

fn finish_line(tia: &mut Tia) {
    let start = tia.v_line;
    while tia.v_line == start {
        step(tia);
    }
}

#[test]
fn draws_background_pixels() {
    let mut tia = new_tia();
    tia.write(registers::COLUBK, 0x08).unwrap();
    // COLUBK is shadowed, so the write only takes effect starting next tick.
    step(&mut tia);
    run_to_column(&mut tia, 0);
    step(&mut tia);
    let pixel = *tia.frame.get_pixel(HBLANK_WIDTH as u32, tia.v_line as u32);
    assert_eq!(pixel, tia.color_pixel(0x08));
}

#[test]
fn wsync_holds_rdy_until_next_line() {
    let mut tia = new_tia();
    assert!(!tia.rdy());
    tia.write(registers::WSYNC, 0).unwrap();
    assert!(tia.rdy());
    finish_line(&mut tia);
    assert!(!tia.rdy());
}

#[test]
fn playfield_draws_left_half_pattern() {
    let mut tia = new_tia();
    tia.write(registers::COLUPF, 0x1E).unwrap();
    tia.write(registers::COLUBK, 0x00).unwrap();
    // PF0's top nibble (bits 4-7) lights the first 4 playfield groups (16
    // pixels).
    tia.write(registers::PF0, 0b1111_0000).unwrap();
    // Registers are shadowed; let two ticks pass so both the writes and the
    // precomputed pattern have latched.
    step(&mut tia);
    step(&mut tia);

    let colupf_pixel = tia.color_pixel(0x1E);
    let colubk_pixel = tia.color_pixel(0x00);

    run_to_column(&mut tia, 0);
    step(&mut tia);
    let lit = *tia.frame.get_pixel((HBLANK_WIDTH) as u32, tia.v_line as u32);
    assert_eq!(lit, colupf_pixel);

    run_to_column(&mut tia, 20);
    step(&mut tia);
    let blank = *tia.frame.get_pixel((HBLANK_WIDTH + 20) as u32, tia.v_line as u32);
    assert_eq!(blank, colubk_pixel);
}

#[test]
fn collision_detects_ball_and_playfield() {
    let mut tia = new_tia();
    tia.write(registers::CTRLPF, flags::CTRLPF_BALL_WIDTH_MASK).unwrap();
    tia.write(registers::PF0, 0b1111_0000).unwrap();
    tia.write(registers::ENABL, flags::ENAXX_ENABLE).unwrap();
    tia.ball.set_enabled(true);
    tia.ball.width = 8;
    for _ in 0..4 {
        step(&mut tia);
    }
    run_to_column(&mut tia, 1);
    step(&mut tia);
    assert_ne!(tia.collisions.cxblpf & 0x80, 0);
}

#[test]
fn hmove_shifts_sprite_left_by_clock_value() {
    let mut tia = new_tia();
    // A motion nibble of -2 (0b1110 in the top nibble) should drag the
    // sprite's drawing start two extra pixels to the left.
    tia.write(registers::HMP0, 0b1110_0000).unwrap();
    tia.write(registers::HMOVE, 0).unwrap();
    // Let the whole HBLANK (plus comb extension, if any) elapse once so the
    // ripple counter runs to completion.
    for _ in 0..HBLANK_EXTENDED_WIDTH {
        step(&mut tia);
    }
    // The player's clock should have advanced further than a plain visible
    // count would, since HMOVE ticked it extra times during blanking.
    assert!(tia.players[0].clock() > 0);
}

#[test]
fn frame_callback_fires_on_vsync_rising_edge() {
    let mut tia = new_tia();
    let fired = std::rc::Rc::new(std::cell::RefCell::new(false));
    let fired_clone = fired.clone();
    tia.frame_callback = Some(Box::new(move |_frame| {
        *fired_clone.borrow_mut() = true;
    }));

    tia.write(registers::VSYNC, 0).unwrap();
    assert!(!*fired.borrow());
    tia.write(registers::VSYNC, flags::VSYNC_ON).unwrap();
    assert!(*fired.borrow());
}

#[test]
fn audio_volume_reaches_the_sample() {
    let mut tia = new_tia();
    tia.write(registers::AUDC0, 0x0).unwrap(); // SetToOne: always on
    tia.write(registers::AUDV0, 0xF).unwrap();
    let (left, _right) = tia.audio_sample();
    assert_eq!(left, 0xF);
}

#[test]
fn cxclr_clears_collision_latches() {
    let mut tia = new_tia();
    tia.collisions.cxppmm = 0xC0;
    tia.write(registers::CXCLR, 0).unwrap();
    assert_eq!(tia.collisions.cxppmm, 0);
}

#[test]
fn vertical_delay_selects_previous_graphics() {
    let mut tia = new_tia();
    tia.write(registers::VDELP0, flags::VDELXX_ON).unwrap();
    tia.write(registers::GRP0, 0xFF).unwrap();
    assert!(tia.players[0].vertical_delay);
    // With nothing written before this, the "old" copy is still all zero.
    assert_eq!(tia.players[0].clock(), 0);
}
