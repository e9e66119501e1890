/// Snapshot of the PPU's NMI-related state at the moment a trace point fires,
/// for diffing against a reference trace when chasing timing bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmiDebugState {
    /// Mirrors PPUCTRL bit 7: whether NMI generation is currently armed.
    pub nmi_output: bool,
    /// Whether an NMI has been latched and not yet delivered to the CPU.
    pub nmi_pending: bool,
    pub scanline: i16,
    pub cycle: u16,
    pub frame: u32,
}
