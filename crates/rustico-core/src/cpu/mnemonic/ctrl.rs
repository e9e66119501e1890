use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::cpu::status::Status;

/// Software interrupt. The two bytes after the opcode are always skipped (the
/// second is conventionally a break signature byte), so the return address
/// pushed is one past where addressing already left `pc`.
pub(crate) fn exec_brk<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert!(step < 6);
    if step + 1 != 6 {
        let _ = bus.read(cpu.pc);
        return;
    }
    let return_pc = cpu.pc.wrapping_add(1);
    cpu.push_u16(bus, return_pc);
    let p = (cpu.p | Status::BREAK | Status::UNUSED).bits();
    cpu.push(bus, p);
    cpu.p.set_i(true);
    cpu.pc = Cpu::irq_vector(bus);
}

/// Never actually dispatched: JMP's `exec_len` is 0, so `Cpu::step` jumps
/// directly using the addressing-resolved target instead of running exec.
pub(crate) fn exec_jmp<B: Bus>(_cpu: &mut Cpu, _bus: &mut B, _step: u8) {
    unreachable!("JMP has exec_len() == 0 and jumps via Cpu::step directly");
}

pub(crate) fn exec_jsr<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert!(step < 5);
    if step + 1 != 5 {
        let _ = bus.read(cpu.pc);
        return;
    }
    let return_pc = cpu.pc.wrapping_sub(1);
    cpu.push_u16(bus, return_pc);
    cpu.pc = cpu.effective_addr;
}

pub(crate) fn exec_rti<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert!(step < 5);
    if step + 1 != 5 {
        let _ = bus.read(cpu.pc);
        return;
    }
    let p_byte = cpu.pull(bus);
    let mut p = Status::from_byte(p_byte);
    p.set_b(false);
    p.set_u(true);
    cpu.p = p;
    cpu.pc = cpu.pull_u16(bus);
}

pub(crate) fn exec_rts<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    debug_assert!(step < 5);
    if step + 1 != 5 {
        let _ = bus.read(cpu.pc);
        return;
    }
    cpu.pc = cpu.pull_u16(bus).wrapping_add(1);
}

#[cfg(test)]
mod ctrl_tests {
    use crate::cpu::mnemonic::{Mnemonic, tests::InstrTest};

    #[test]
    fn test_brk() {
        InstrTest::new(Mnemonic::BRK).test(|verify, cpu, _| {
            assert_eq!(cpu.s, verify.cpu.s.wrapping_sub(3));
            assert!(cpu.p.i());
        });
    }

    #[test]
    fn test_jsr() {
        InstrTest::new(Mnemonic::JSR).test(|verify, cpu, _| {
            assert_eq!(cpu.pc, verify.addr);
            assert_eq!(cpu.s, verify.cpu.s.wrapping_sub(2));
        });
    }

    #[test]
    fn test_rts() {
        InstrTest::new(Mnemonic::RTS).test(|verify, cpu, _| {
            assert_eq!(cpu.s, verify.cpu.s.wrapping_add(2));
        });
    }

    #[test]
    fn test_rti() {
        InstrTest::new(Mnemonic::RTI).test(|verify, cpu, _| {
            assert_eq!(cpu.s, verify.cpu.s.wrapping_add(3));
            assert!(!cpu.p.b());
            assert!(cpu.p.u());
        });
    }
}
