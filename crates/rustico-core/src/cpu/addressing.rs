/// The 6502 (and undocumented-opcode) addressing modes.
///
/// Cycle timing and effective-address computation for each mode live on the
/// per-mnemonic `exec` implementations in [`super::mnemonic`], keyed by the
/// `(Mnemonic, Addressing)` pairs baked into [`super::lookup::LOOKUP_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Addressing {
    Implied,
    Accumulator,
    Immediate,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    IndirectX,
    IndirectY,
    Relative,
}
