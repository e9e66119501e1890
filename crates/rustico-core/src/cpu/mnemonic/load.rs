use crate::bus::Bus;
use crate::cpu::Cpu;

/// The undocumented LAS ANDs the stack pointer into the fetched byte and
/// broadcasts the result to A, X and S all at once.
pub(crate) fn exec_las<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let value = cpu.operand_value & cpu.s;
    cpu.a = value;
    cpu.x = value;
    cpu.s = value;
    cpu.p.set_zn(value);
}

pub(crate) fn exec_lax<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let value = cpu.operand_value;
    cpu.a = value;
    cpu.x = value;
    cpu.p.set_zn(value);
}

pub(crate) fn exec_lda<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.a = cpu.operand_value;
    cpu.p.set_zn(cpu.a);
}

pub(crate) fn exec_ldx<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.x = cpu.operand_value;
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_ldy<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.y = cpu.operand_value;
    cpu.p.set_zn(cpu.y);
}

pub(crate) fn exec_sax<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    bus.write(cpu.effective_addr, cpu.a & cpu.x);
}

/// Reconstructs the high byte of the operand address before the Y/X index
/// was added, which is what the SHA/SHX/SHY store-address quirk ANDs into
/// the stored value (and, for SHX/SHY, into the address itself).
fn pre_index_hi(effective_addr: u16, index: u8) -> u8 {
    (effective_addr.wrapping_sub(index as u16) >> 8) as u8
}

pub(crate) fn exec_sha<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let hi = pre_index_hi(cpu.effective_addr, cpu.y);
    let value = cpu.a & cpu.x & hi.wrapping_add(1);
    bus.write(cpu.effective_addr, value);
}

pub(crate) fn exec_shx<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let base = cpu.effective_addr.wrapping_sub(cpu.y as u16);
    let lo = base as u8;
    let hi = (base >> 8) as u8;

    let addr_hi = hi & cpu.x.wrapping_add(1);
    let addr_lo = lo.wrapping_add(cpu.y);
    let addr = ((addr_hi as u16) << 8) | addr_lo as u16;

    let value = cpu.x & hi.wrapping_add(1);
    bus.write(addr, value);
}

pub(crate) fn exec_shy<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    let base = cpu.effective_addr.wrapping_sub(cpu.x as u16);
    let lo = base as u8;
    let hi = (base >> 8) as u8;

    let addr_hi = hi & cpu.y.wrapping_add(1);
    let addr_lo = lo.wrapping_add(cpu.x);
    let addr = ((addr_hi as u16) << 8) | addr_lo as u16;

    let value = cpu.y & hi.wrapping_add(1);
    bus.write(addr, value);
}

pub(crate) fn exec_sta<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    bus.write(cpu.effective_addr, cpu.a);
}

pub(crate) fn exec_stx<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    bus.write(cpu.effective_addr, cpu.x);
}

pub(crate) fn exec_sty<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    bus.write(cpu.effective_addr, cpu.y);
}
