use crate::bus::Bus;
use crate::cpu::Cpu;

fn branch_if<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8, cond: bool) {
    debug_assert!(step < 3);
    if step + 1 != 3 {
        return;
    }
    if cond {
        cpu.pc = cpu.effective_addr;
    }
}

pub(crate) fn exec_bcc<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, !cpu.p.c());
}

pub(crate) fn exec_bcs<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, cpu.p.c());
}

pub(crate) fn exec_beq<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, cpu.p.z());
}

pub(crate) fn exec_bne<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, !cpu.p.z());
}

pub(crate) fn exec_bmi<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, cpu.p.n());
}

pub(crate) fn exec_bpl<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, !cpu.p.n());
}

pub(crate) fn exec_bvc<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, !cpu.p.v());
}

pub(crate) fn exec_bvs<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    branch_if(cpu, bus, step, cpu.p.v());
}

#[cfg(test)]
mod bra_test {
    use crate::cpu::mnemonic::{Mnemonic, tests::InstrTest};

    #[test]
    fn test_bcc() {
        InstrTest::new(Mnemonic::BCC).test_branch(|v, cpu, _| {
            let taken = !v.cpu.p.c();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bcs() {
        InstrTest::new(Mnemonic::BCS).test_branch(|v, cpu, _| {
            let taken = v.cpu.p.c();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_beq() {
        InstrTest::new(Mnemonic::BEQ).test_branch(|v, cpu, _| {
            let taken = v.cpu.p.z();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bne() {
        InstrTest::new(Mnemonic::BNE).test_branch(|v, cpu, _| {
            let taken = !v.cpu.p.z();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bmi() {
        InstrTest::new(Mnemonic::BMI).test_branch(|v, cpu, _| {
            let taken = v.cpu.p.n();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bpl() {
        InstrTest::new(Mnemonic::BPL).test_branch(|v, cpu, _| {
            let taken = !v.cpu.p.n();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bvc() {
        InstrTest::new(Mnemonic::BVC).test_branch(|v, cpu, _| {
            let taken = !v.cpu.p.v();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }

    #[test]
    fn test_bvs() {
        InstrTest::new(Mnemonic::BVS).test_branch(|v, cpu, _| {
            let taken = v.cpu.p.v();
            assert_eq!(cpu.pc == v.addr, taken);
            taken
        });
    }
}
