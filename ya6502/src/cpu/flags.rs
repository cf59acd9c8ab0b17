//! Bit masks for the processor status register (`P`).

pub const N: u8 = 0b1000_0000;
pub const V: u8 = 0b0100_0000;
pub const UNUSED: u8 = 0b0010_0000;
pub const B: u8 = 0b0001_0000;
pub const D: u8 = 0b0000_1000;
pub const I: u8 = 0b0000_0100;
pub const Z: u8 = 0b0000_0010;
pub const C: u8 = 0b0000_0001;

/// The bits pushed to the stack by `PHP`, and by a hardware or software
/// interrupt, in addition to whichever combination of the other flags is
/// currently set. `BRK` and `PHP` both set `B`; a hardware IRQ or NMI leaves
/// it clear.
pub const PUSHED: u8 = UNUSED;

pub fn flags_to_string(flags: u8) -> String {
    format!(
        "{}{}{}{}{}{}{}{}",
        if flags & N != 0 { 'N' } else { '-' },
        if flags & V != 0 { 'V' } else { '-' },
        '-',
        if flags & B != 0 { 'B' } else { '-' },
        if flags & D != 0 { 'D' } else { '-' },
        if flags & I != 0 { 'I' } else { '-' },
        if flags & Z != 0 { 'Z' } else { '-' },
        if flags & C != 0 { 'C' } else { '-' },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_flags() {
        assert_eq!(flags_to_string(0), "--------");
        assert_eq!(flags_to_string(N | Z | C), "N-----ZC");
        assert_eq!(flags_to_string(I | D), "-----ID-");
    }
}
