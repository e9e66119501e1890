use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::cpu::status::{BIT_6, BIT_7};

pub(crate) fn exec_and<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a &= cpu.operand_value;
    cpu.p.set_zn(cpu.a);
}

pub(crate) fn exec_bit<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let m = cpu.operand_value;
    cpu.p.set_z(cpu.a & m == 0);
    cpu.p.set_n(m & BIT_7 != 0);
    cpu.p.set_v(m & BIT_6 != 0);
}

pub(crate) fn exec_eor<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a ^= cpu.operand_value;
    cpu.p.set_zn(cpu.a);
}

pub(crate) fn exec_ora<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a |= cpu.operand_value;
    cpu.p.set_zn(cpu.a);
}
