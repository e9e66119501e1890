use crate::bus::Bus;
use crate::cpu::Cpu;

/// JAM (a.k.a. KIL/HLT) locks the address bus permanently on real hardware;
/// no instruction following it is ever fetched. We model that by leaving the
/// program counter pointed back at the opcode byte, so the next `step` call
/// re-fetches and re-jams instead of running into whatever follows.
pub(crate) fn exec_jam<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.pc = cpu.pc.wrapping_sub(1);
}
