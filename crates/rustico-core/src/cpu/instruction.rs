use crate::cpu::{
    addressing::Addressing,
    cycle::{CYCLE_TABLE, Cycle},
    lookup::LOOKUP_TABLE,
    mnemonic::Mnemonic,
};

/// A decoded opcode: the mnemonic it executes and the addressing mode used
/// to compute its operand's effective address.
///
/// Per-cycle execution is driven by [`Mnemonic::exec`], which is stepped
/// from 0 to `Mnemonic::exec_len() - 1` once per CPU cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Instruction {
    pub(crate) mnemonic: Mnemonic,
    pub(crate) addressing: Addressing,
}

impl Instruction {
    pub(crate) const fn new(mnemonic: Mnemonic, addressing: Addressing) -> Self {
        Self { mnemonic, addressing }
    }

    /// The opcode byte this instruction decodes from, recovered from its slot
    /// in [`LOOKUP_TABLE`]. Several illegal-opcode duplicates decode to the
    /// same `(Mnemonic, Addressing)` pair; any of them behaves identically,
    /// so the first match is returned.
    pub(crate) fn opcode(&self) -> u8 {
        LOOKUP_TABLE
            .iter()
            .position(|i| i == self)
            .expect("every Instruction originates from LOOKUP_TABLE") as u8
    }

    pub(crate) fn cycle(&self) -> Cycle {
        CYCLE_TABLE[self.opcode() as usize]
    }
}

macro_rules! ctor {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl Instruction {
            $(
                pub(crate) const fn $name(addr: Addressing) -> Self {
                    Self::new(Mnemonic::$variant, addr)
                }
            )*
        }
    };
}

ctor! {
    adc => ADC, anc => ANC, and => AND, arr => ARR, asl => ASL, asr => ASR,
    bcc => BCC, bcs => BCS, beq => BEQ, bit => BIT, bmi => BMI, bne => BNE,
    bpl => BPL, brk => BRK, bvc => BVC, bvs => BVS, clc => CLC, cld => CLD,
    cli => CLI, clv => CLV, cmp => CMP, cpx => CPX, cpy => CPY, dcp => DCP,
    dec => DEC, dex => DEX, dey => DEY, eor => EOR, inc => INC, inx => INX,
    iny => INY, isc => ISC, jam => JAM, jmp => JMP, jsr => JSR, las => LAS,
    lax => LAX, lda => LDA, ldx => LDX, ldy => LDY, lsr => LSR, nop => NOP,
    ora => ORA, pha => PHA, php => PHP, pla => PLA, plp => PLP, rla => RLA,
    rol => ROL, ror => ROR, rra => RRA, rti => RTI, rts => RTS, sax => SAX,
    sbc => SBC, sbx => SBX, sec => SEC, sed => SED, sei => SEI, sha => SHA,
    shs => SHS, shx => SHX, shy => SHY, slo => SLO, sre => SRE, sta => STA,
    stx => STX, sty => STY, tax => TAX, tay => TAY, tsx => TSX, txa => TXA,
    txs => TXS, tya => TYA, xaa => XAA,
}
