/// Distinguishes a cold boot from a console reset-button press; the CPU,
/// PPU and APU each clear a different subset of state depending on which
/// one fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetKind {
    /// Power applied from cold: all registers return to their power-on
    /// defaults.
    PowerOn,
    /// Reset line pulsed while already running: a handful of registers
    /// retain their value across the reset.
    Soft,
}
