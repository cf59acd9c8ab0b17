use thiserror::Error;

/// Returned by the address decoder when a CPU address doesn't map to any
/// device. In practice this shouldn't happen: ROM, RAM/PIA and TIA between
/// them cover the full 13-bit address space.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("address ${address:04X} did not decode to any device")]
pub struct AddressDecodeError {
    pub address: u16,
}

/// Returned by [`crate::console::Console::new`] when the requested
/// configuration can't be realized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("illegal ROM size: {size} bytes; valid sizes are 2048 and 4096")]
    IllegalRomSize { size: usize },
    #[error("joysticks and paddles can't be wired to the same port at once")]
    ConflictingInputConfiguration,
}
