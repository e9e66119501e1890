use crate::bus::Bus;
use crate::cpu::Cpu;

/// The undocumented SHS ANDs A and X into S, then ANDs the result with the
/// high byte of the target address (plus 1) and stores that to memory.
pub(crate) fn exec_shs<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let s = cpu.a & cpu.x;
    cpu.s = s;
    let hi = (cpu.effective_addr >> 8) as u8;
    let m = s & hi.wrapping_add(1);
    bus.write(cpu.effective_addr, m);
}

pub(crate) fn exec_tax<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.x = cpu.a;
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_tay<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.y = cpu.a;
    cpu.p.set_zn(cpu.y);
}

pub(crate) fn exec_tsx<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.x = cpu.s;
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_txa<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a = cpu.x;
    cpu.p.set_zn(cpu.a);
}

pub(crate) fn exec_txs<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.s = cpu.x;
}

pub(crate) fn exec_tya<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a = cpu.y;
    cpu.p.set_zn(cpu.a);
}

#[cfg(test)]
mod trans_tests {
    use crate::cpu::mnemonic::{Mnemonic, tests::InstrTest};

    #[test]
    fn test_shs() {
        InstrTest::new(Mnemonic::SHS).test(|verify, cpu, bus| {
            let v = verify.cpu.a & verify.cpu.x;
            assert_eq!(cpu.s, v);
            let v = v & verify.addr_hi.wrapping_add(1);
            let m = bus.read(verify.addr);
            assert_eq!(v, m);
        });
    }

    #[test]
    fn test_tax() {
        InstrTest::new(Mnemonic::TAX).test(|verify, cpu, _| {
            let v = verify.cpu.a;
            assert_eq!(cpu.x, v);
            verify.check_nz(cpu.p, v);
        });
    }

    #[test]
    fn test_tay() {
        InstrTest::new(Mnemonic::TAY).test(|verify, cpu, _| {
            let v = verify.cpu.a;
            assert_eq!(cpu.y, v);
            verify.check_nz(cpu.p, v);
        });
    }

    #[test]
    fn test_tsx() {
        InstrTest::new(Mnemonic::TSX).test(|verify, cpu, _| {
            let v = verify.cpu.s;
            assert_eq!(cpu.x, v);
            verify.check_nz(cpu.p, v);
        });
    }

    #[test]
    fn test_txa() {
        InstrTest::new(Mnemonic::TXA).test(|verify, cpu, _| {
            let v = verify.cpu.x;
            assert_eq!(cpu.a, v);
            verify.check_nz(cpu.p, v);
        });
    }

    #[test]
    fn test_txs() {
        InstrTest::new(Mnemonic::TXS).test(|verify, cpu, _| {
            let v = verify.cpu.x;
            assert_eq!(cpu.s, v);
        });
    }

    #[test]
    fn test_tya() {
        InstrTest::new(Mnemonic::TYA).test(|verify, cpu, _| {
            let v = verify.cpu.y;
            assert_eq!(cpu.a, v);
            verify.check_nz(cpu.p, v);
        });
    }
}
