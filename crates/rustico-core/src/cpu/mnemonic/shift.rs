use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::cpu::addressing::Addressing;
use crate::cpu::status::{BIT_0, BIT_7};

/// ASL/LSR/ROL/ROR on memory are read-modify-write: read the old value,
/// dummy-write it back, then write the shifted result. On the accumulator
/// addressing mode there's no bus-visible RMW at all; the whole thing happens
/// on the single dummy-read cycle that stands in for it.
fn shift_op<B: Bus, F: Fn(&mut Cpu, u8) -> u8>(cpu: &mut Cpu, bus: &mut B, step: u8, f: F) {
    debug_assert!(step < 3);
    if cpu.current_instruction().addressing == Addressing::Accumulator {
        if step == 0 {
            let _ = bus.read(cpu.pc);
        } else if step + 1 == 3 {
            cpu.a = f(cpu, cpu.a);
        }
        return;
    }
    let addr = cpu.effective_addr;
    match step {
        0 => cpu.pending_rmw = cpu.operand_value,
        1 => bus.write(addr, cpu.pending_rmw),
        _ => {
            let new = f(cpu, cpu.pending_rmw);
            bus.write(addr, new);
        }
    }
}

pub(crate) fn exec_asl<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    shift_op(cpu, bus, step, |cpu, old| {
        cpu.p.set_c(old & BIT_7 != 0);
        let new = old << 1;
        cpu.p.set_zn(new);
        new
    });
}

pub(crate) fn exec_lsr<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    shift_op(cpu, bus, step, |cpu, old| {
        cpu.p.set_c(old & BIT_0 != 0);
        let new = old >> 1;
        cpu.p.set_n(false);
        cpu.p.set_z(new == 0);
        new
    });
}

pub(crate) fn exec_rol<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    shift_op(cpu, bus, step, |cpu, old| {
        let carry_in = cpu.p.c() as u8;
        cpu.p.set_c(old & BIT_7 != 0);
        let new = (old << 1) | carry_in;
        cpu.p.set_zn(new);
        new
    });
}

pub(crate) fn exec_ror<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    shift_op(cpu, bus, step, |cpu, old| {
        let carry_in = if cpu.p.c() { BIT_7 } else { 0 };
        cpu.p.set_c(old & BIT_0 != 0);
        let new = (old >> 1) | carry_in;
        cpu.p.set_zn(new);
        new
    });
}

#[cfg(test)]
mod shift_tests {
    use crate::cpu::{
        mnemonic::{Mnemonic, tests::InstrTest},
        status::{BIT_0, BIT_7},
    };

    #[test]
    fn test_asl() {
        InstrTest::new(Mnemonic::ASL).test(|verify, cpu, bus| {
            if cpu.opcode_in_flight == Some(0x0A) {
                let c = verify.cpu.a & BIT_7 != 0;
                assert_eq!(cpu.p.c(), c);
                let v = verify.cpu.a << 1;
                verify.check_nz(cpu.p, v);
            } else {
                let c = verify.m & BIT_7 != 0;
                assert_eq!(cpu.p.c(), c);
                let v = verify.m << 1;
                let m = bus.read(verify.addr);
                assert_eq!(v, m);
                verify.check_nz(cpu.p, v);
            }
        });
    }

    #[test]
    fn test_lsr() {
        InstrTest::new(Mnemonic::LSR).test(|verify, cpu, bus| {
            if cpu.opcode_in_flight == Some(0x4A) {
                // Accumulator mode
                let c = verify.cpu.a & BIT_0 != 0;
                assert_eq!(cpu.p.c(), c);
                let v = verify.cpu.a >> 1;
                verify.check_nz(cpu.p, v);
            } else {
                // Memory mode
                let c = verify.m & BIT_0 != 0;
                assert_eq!(cpu.p.c(), c);
                let v = verify.m >> 1;
                let m = bus.read(verify.addr);
                assert_eq!(v, m);
                verify.check_nz(cpu.p, v);
            }
        });
    }

    #[test]
    fn test_rol() {
        InstrTest::new(Mnemonic::ROL).test(|verify, cpu, bus| {
            if cpu.opcode_in_flight == Some(0x2A) {
                // Accumulator mode
                let c_in = verify.cpu.p.c() as u8;
                let c_out = verify.cpu.a & BIT_7 != 0;
                assert_eq!(cpu.p.c(), c_out);
                let v = (verify.cpu.a << 1) | c_in;
                verify.check_nz(cpu.p, v);
            } else {
                // Memory mode
                let c_in = verify.cpu.p.c() as u8;
                let c_out = verify.m & BIT_7 != 0;
                assert_eq!(cpu.p.c(), c_out);
                let v = (verify.m << 1) | c_in;
                let m = bus.read(verify.addr);
                assert_eq!(v, m);
                verify.check_nz(cpu.p, v);
            }
        });
    }

    #[test]
    fn test_ror() {
        InstrTest::new(Mnemonic::ROR).test(|verify, cpu, bus| {
            if cpu.opcode_in_flight == Some(0x6A) {
                // Accumulator mode
                let c_in = (verify.cpu.p.c() as u8) << 7;
                let c_out = verify.cpu.a & BIT_0 != 0;
                assert_eq!(cpu.p.c(), c_out);
                let v = (verify.cpu.a >> 1) | c_in;
                verify.check_nz(cpu.p, v);
            } else {
                // Memory mode
                let c_in = (verify.cpu.p.c() as u8) << 7;
                let c_out = verify.m & BIT_0 != 0;
                assert_eq!(cpu.p.c(), c_out);
                let v = (verify.m >> 1) | c_in;
                let m = bus.read(verify.addr);
                assert_eq!(v, m);
                verify.check_nz(cpu.p, v);
            }
        });
    }
}
