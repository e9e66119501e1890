use crate::bus::Bus;
use crate::cpu::Cpu;

pub(crate) fn exec_clc<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_c(false);
}

pub(crate) fn exec_cld<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_d(false);
}

pub(crate) fn exec_cli<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_i(false);
}

pub(crate) fn exec_clv<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_v(false);
}

pub(crate) fn exec_sec<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_c(true);
}

pub(crate) fn exec_sed<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_d(true);
}

pub(crate) fn exec_sei<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.p.set_i(true);
}
