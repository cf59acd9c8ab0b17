use image::Pixel;
use image::Rgba;

/// A color palette that maps 8-bit TIA color codes (see
/// [`crate::tia::VideoOutput::pixel`]) to RGBA pixels.
pub type Palette = Vec<Rgba<u8>>;

/// Creates a TIA palette of RGBA colors out of a `u32` array slice. Each
/// number represents a 3-byte RGB color, where each channel is represented by
/// 8 bits.
///
/// Note: TIA only uses 7 bits for representing colors, and bit 0 is unused.
/// For simplicity, we just store each color twice so that accessing the
/// palette with bit 0 set either to 0 or 1 yields the same RGBA pixel.
pub fn create_palette(colors: &[u32]) -> Palette {
    let mut palette = Palette::with_capacity(colors.len() * 2);
    for color in colors {
        let color_rgba = Rgba::from_channels(
            ((color & 0xFF0000) >> 16) as u8,
            ((color & 0xFF00) >> 8) as u8,
            (color & 0xFF) as u8,
            0xFF,
        );
        palette.push(color_rgba);
        palette.push(color_rgba);
    }
    return palette;
}

/// Synthesizes a 128-entry TIA palette for a given TV standard out of the
/// chip's 16 hues x 8 luminance levels, following the same luma/chroma
/// decoding a real TV would apply to the TIA's composite output. Hue 0 is
/// always a greyscale ramp; hues 1-15 are spaced evenly around the color
/// wheel, with the starting phase and rotation direction differing between
/// NTSC and PAL/SECAM (PAL alternates the chroma phase every other line on
/// real hardware, which this fixed lookup does not attempt to model, per the
/// "no signal-level modeling" non-goal).
fn synthesize_palette(hue_phase_degrees: f64, hue_step_degrees: f64) -> Vec<u32> {
    let mut colors = Vec::with_capacity(16 * 8);
    for hue in 0..16u32 {
        for luma in 0..8u32 {
            let y = 0.05 + (luma as f64 / 7.0) * 0.85;
            let (i, q) = if hue == 0 {
                (0.0, 0.0)
            } else {
                let angle = (hue_phase_degrees + (hue - 1) as f64 * hue_step_degrees).to_radians();
                let chroma = 0.35;
                (chroma * angle.cos(), chroma * angle.sin())
            };
            let r = y + 0.956 * i + 0.621 * q;
            let g = y - 0.272 * i - 0.647 * q;
            let b = y - 1.106 * i + 1.703 * q;
            let clamp = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
            colors.push((clamp(r) << 16) | (clamp(g) << 8) | clamp(b));
        }
    }
    colors
}

/// The palette used by NTSC consoles.
pub fn ntsc_palette() -> Palette {
    create_palette(&synthesize_palette(45.0, -22.5))
}

/// The palette used by PAL consoles. PAL TIA chips run at a slightly
/// different color clock and invert the chroma rotation relative to NTSC.
pub fn pal_palette() -> Palette {
    create_palette(&synthesize_palette(225.0, 22.5))
}

/// The palette used by SECAM consoles. Real SECAM hardware only has eight
/// distinct hues (no luminance gradient within a hue); this is approximated
/// here by reusing the PAL phase table, since the core does not model
/// signal-level SECAM encoding (see the non-goals).
pub fn secam_palette() -> Palette {
    pal_palette()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creating_palette() {
        assert_eq!(create_palette(&[]), Palette::new());
        assert_eq!(
            create_palette(&[0x123456]),
            vec![
                *Rgba::from_slice(&[0x12, 0x34, 0x56, 0xFF]),
                *Rgba::from_slice(&[0x12, 0x34, 0x56, 0xFF]),
            ]
        );

        let three_color_palette = create_palette(&[0xFEDCBA, 0x5A0345, 0x12A5E4]);
        assert_eq!(
            three_color_palette,
            vec![
                *Rgba::from_slice(&[0xFE, 0xDC, 0xBA, 0xFF]),
                *Rgba::from_slice(&[0xFE, 0xDC, 0xBA, 0xFF]),
                *Rgba::from_slice(&[0x5A, 0x03, 0x45, 0xFF]),
                *Rgba::from_slice(&[0x5A, 0x03, 0x45, 0xFF]),
                *Rgba::from_slice(&[0x12, 0xA5, 0xE4, 0xFF]),
                *Rgba::from_slice(&[0x12, 0xA5, 0xE4, 0xFF]),
            ]
        );
    }

    #[test]
    fn ntsc_palette_has_256_entries() {
        assert_eq!(ntsc_palette().len(), 256);
    }

    #[test]
    fn grayscale_hue_is_actually_gray() {
        let palette = ntsc_palette();
        // Hue 0, max luminance: indices 14 and 15 (2 entries per color, 8
        // luminances per hue).
        let pixel = palette[14];
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }

    #[test]
    fn pal_and_ntsc_palettes_differ() {
        assert_ne!(ntsc_palette(), pal_palette());
    }
}
