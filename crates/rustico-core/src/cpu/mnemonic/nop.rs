use crate::bus::Bus;
use crate::cpu::Cpu;

/// Covers both the single-byte NOP ($EA) and every illegal NOP variant
/// (`$04`, `$0C`, `$14`, ... ); the addressing mode still drives the operand
/// read for its side effect on the bus (and cycle count), but the value is
/// discarded.
pub(crate) fn exec_nop<B: Bus>(_cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
}

#[cfg(test)]
mod nop_test {
    use crate::cpu::mnemonic::{Mnemonic, tests::InstrTest};

    #[test]
    fn test_nop_preserves_registers() {
        InstrTest::new(Mnemonic::NOP).test(|v, cpu, _| {
            assert_eq!(cpu.a, v.cpu.a);
            assert_eq!(cpu.x, v.cpu.x);
            assert_eq!(cpu.y, v.cpu.y);
            assert_eq!(cpu.p, v.cpu.p);
        });
    }
}
