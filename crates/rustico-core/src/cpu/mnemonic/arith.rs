use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::cpu::status::{BIT_0, BIT_5, BIT_6, BIT_7};

fn adc_into(cpu: &mut Cpu, m: u8) {
    let carry_in = cpu.p.c() as u16;
    let sum = cpu.a as u16 + m as u16 + carry_in;
    let result = sum as u8;
    cpu.p.set_c(sum > 0xFF);
    cpu.p.set_v((!(cpu.a ^ m) & (cpu.a ^ result) & BIT_7) != 0);
    cpu.a = result;
    cpu.p.set_zn(result);
}

fn sbc_into(cpu: &mut Cpu, m: u8) {
    let carry_in = cpu.p.c() as u16;
    let value = !m as u16;
    let sum = cpu.a as u16 + value + carry_in;
    let result = sum as u8;
    cpu.p.set_c(sum > 0xFF);
    cpu.p.set_v(((cpu.a ^ result) & (!m ^ result) & BIT_7) != 0);
    cpu.a = result;
    cpu.p.set_zn(result);
}

/// Shared shape for the illegal RMW-combo instructions (DCP, ISC, RLA, RRA,
/// SLO, SRE): read the old value, dummy-write it back while computing the
/// modified value, then write the modified value and fold it into the
/// accumulator via `combine`.
fn rmw_combo<B: Bus, F: Fn(&mut Cpu, u8) -> u8, G: Fn(&mut Cpu, u8)>(
    cpu: &mut Cpu,
    bus: &mut B,
    step: u8,
    modify: F,
    combine: G,
) {
    debug_assert!(step < 3);
    let addr = cpu.effective_addr;
    match step {
        0 => cpu.pending_rmw = cpu.operand_value,
        1 => {
            bus.write(addr, cpu.pending_rmw);
            cpu.pending_rmw = modify(cpu, cpu.pending_rmw);
        }
        _ => {
            bus.write(addr, cpu.pending_rmw);
            combine(cpu, cpu.pending_rmw);
        }
    }
}

pub(crate) fn exec_adc<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    adc_into(cpu, cpu.operand_value);
}

pub(crate) fn exec_anc<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a &= cpu.operand_value;
    cpu.p.set_zn(cpu.a);
    cpu.p.set_c(cpu.a & BIT_7 != 0);
}

pub(crate) fn exec_arr<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a &= cpu.operand_value;
    let carry_in = if cpu.p.c() { BIT_7 } else { 0 };
    cpu.a = (cpu.a >> 1) | carry_in;
    cpu.p.set_n(cpu.a & BIT_7 != 0);
    cpu.p.set_z(cpu.a == 0);
    cpu.p.set_v((cpu.a & BIT_6 != 0) ^ (cpu.a & BIT_5 != 0));
    cpu.p.set_c(cpu.a & BIT_6 != 0);
}

pub(crate) fn exec_asr<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a &= cpu.operand_value;
    cpu.p.set_c(cpu.a & BIT_0 != 0);
    cpu.a >>= 1;
    cpu.p.set_zn(cpu.a);
}

pub(crate) fn exec_cmp<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let m = cpu.operand_value;
    cpu.p.set_c(cpu.a >= m);
    cpu.p.set_zn(cpu.a.wrapping_sub(m));
}

pub(crate) fn exec_cpx<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let m = cpu.operand_value;
    cpu.p.set_c(cpu.x >= m);
    cpu.p.set_zn(cpu.x.wrapping_sub(m));
}

pub(crate) fn exec_cpy<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let m = cpu.operand_value;
    cpu.p.set_c(cpu.y >= m);
    cpu.p.set_zn(cpu.y.wrapping_sub(m));
}

pub(crate) fn exec_dcp<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(
        cpu,
        bus,
        step,
        |_, v| v.wrapping_sub(1),
        |cpu, m| {
            cpu.p.set_c(cpu.a >= m);
            cpu.p.set_zn(cpu.a.wrapping_sub(m));
        },
    );
}

pub(crate) fn exec_isc<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(cpu, bus, step, |_, v| v.wrapping_add(1), sbc_into);
}

pub(crate) fn exec_rla<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(
        cpu,
        bus,
        step,
        |cpu, v| {
            let carry_in = cpu.p.c() as u8;
            cpu.p.set_c(v & BIT_7 != 0);
            (v << 1) | carry_in
        },
        |cpu, m| {
            cpu.a &= m;
            cpu.p.set_zn(cpu.a);
        },
    );
}

pub(crate) fn exec_rra<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(
        cpu,
        bus,
        step,
        |cpu, v| {
            let carry_in = if cpu.p.c() { BIT_7 } else { 0 };
            cpu.p.set_c(v & BIT_0 != 0);
            (v >> 1) | carry_in
        },
        adc_into,
    );
}

pub(crate) fn exec_sbc<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    sbc_into(cpu, cpu.operand_value);
}

pub(crate) fn exec_sbx<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let m = cpu.operand_value;
    let ax = cpu.a & cpu.x;
    cpu.p.set_c(ax >= m);
    cpu.x = ax.wrapping_sub(m);
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_slo<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(
        cpu,
        bus,
        step,
        |cpu, v| {
            cpu.p.set_c(v & BIT_7 != 0);
            v << 1
        },
        |cpu, m| {
            cpu.a |= m;
            cpu.p.set_zn(cpu.a);
        },
    );
}

pub(crate) fn exec_sre<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw_combo(
        cpu,
        bus,
        step,
        |cpu, v| {
            cpu.p.set_c(v & BIT_0 != 0);
            v >> 1
        },
        |cpu, m| {
            cpu.a ^= m;
            cpu.p.set_zn(cpu.a);
        },
    );
}

pub(crate) fn exec_xaa<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a = (cpu.a & cpu.x) & cpu.operand_value;
    cpu.p.set_zn(cpu.a);
}
