use crate::bus::Bus;
use crate::cpu::Cpu;

/// DEC/INC are read-modify-write: a read of the old value, a dummy write of
/// that same value back, then the real write of the computed result.
fn rmw<B: Bus, F: Fn(u8) -> u8>(cpu: &mut Cpu, bus: &mut B, step: u8, f: F) {
    debug_assert!(step < 3);
    let addr = cpu.effective_addr;
    match step {
        0 => cpu.pending_rmw = cpu.operand_value,
        1 => {
            bus.write(addr, cpu.pending_rmw);
            cpu.pending_rmw = f(cpu.pending_rmw);
        }
        _ => {
            bus.write(addr, cpu.pending_rmw);
            cpu.p.set_zn(cpu.pending_rmw);
        }
    }
}

pub(crate) fn exec_dec<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw(cpu, bus, step, |v| v.wrapping_sub(1));
}

pub(crate) fn exec_dex<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.x = cpu.x.wrapping_sub(1);
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_dey<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.y = cpu.y.wrapping_sub(1);
    cpu.p.set_zn(cpu.y);
}

pub(crate) fn exec_inc<B: Bus>(cpu: &mut Cpu, bus: &mut B, step: u8) {
    rmw(cpu, bus, step, |v| v.wrapping_add(1));
}

pub(crate) fn exec_inx<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.x = cpu.x.wrapping_add(1);
    cpu.p.set_zn(cpu.x);
}

pub(crate) fn exec_iny<B: Bus>(cpu: &mut Cpu, _bus: &mut B, step: u8) {
    debug_assert_eq!(step, 0);
    cpu.y = cpu.y.wrapping_add(1);
    cpu.p.set_zn(cpu.y);
}

#[cfg(test)]
mod inc_tests {
    use crate::cpu::{
        mnemonic::{Mnemonic, tests::InstrTest},
        status::BIT_7,
    };

    #[test]
    fn test_dec() {
        InstrTest::new(Mnemonic::DEC).test(|verify, cpu, bus| {
            let expected_value = verify.m.wrapping_sub(1);

            assert_eq!(
                bus.read(verify.addr),
                expected_value,
                "Memory was not decremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_value == 0, "Zero flag mismatch");
            assert_eq!(
                cpu.p.n(),
                expected_value & BIT_7 != 0,
                "Negative flag mismatch"
            );

            verify.check_nz(cpu.p, expected_value);
        });
    }

    #[test]
    fn test_dex() {
        InstrTest::new(Mnemonic::DEX).test(|verify, cpu, _| {
            let expected_x = verify.cpu.x.wrapping_sub(1);

            assert_eq!(
                cpu.x, expected_x,
                "X register was not decremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_x == 0, "Zero flag mismatch");
            assert_eq!(cpu.p.n(), expected_x & BIT_7 != 0, "Negative flag mismatch");

            verify.check_nz(cpu.p, expected_x);
        });
    }

    #[test]
    fn test_dey() {
        InstrTest::new(Mnemonic::DEY).test(|verify, cpu, _| {
            let expected_y = verify.cpu.y.wrapping_sub(1);

            assert_eq!(
                cpu.y, expected_y,
                "Y register was not decremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_y == 0, "Zero flag mismatch");
            assert_eq!(cpu.p.n(), expected_y & BIT_7 != 0, "Negative flag mismatch");

            verify.check_nz(cpu.p, expected_y);
        });
    }

    #[test]
    fn test_inc() {
        InstrTest::new(Mnemonic::INC).test(|verify, cpu, bus| {
            let expected_value = verify.m.wrapping_add(1);

            assert_eq!(
                bus.read(verify.addr),
                expected_value,
                "Memory was not incremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_value == 0, "Zero flag mismatch");
            assert_eq!(
                cpu.p.n(),
                expected_value & BIT_7 != 0,
                "Negative flag mismatch"
            );

            verify.check_nz(cpu.p, expected_value);
        });
    }

    #[test]
    fn test_inx() {
        InstrTest::new(Mnemonic::INX).test(|verify, cpu, _| {
            let expected_x = verify.cpu.x.wrapping_add(1);

            assert_eq!(
                cpu.x, expected_x,
                "X register was not incremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_x == 0, "Zero flag mismatch");
            assert_eq!(cpu.p.n(), expected_x & BIT_7 != 0, "Negative flag mismatch");

            verify.check_nz(cpu.p, expected_x);
        });
    }

    #[test]
    fn test_iny() {
        InstrTest::new(Mnemonic::INY).test(|verify, cpu, _| {
            let expected_y = verify.cpu.y.wrapping_add(1);

            assert_eq!(
                cpu.y, expected_y,
                "Y register was not incremented correctly"
            );

            assert_eq!(cpu.p.z(), expected_y == 0, "Zero flag mismatch");
            assert_eq!(cpu.p.n(), expected_y & BIT_7 != 0, "Negative flag mismatch");

            verify.check_nz(cpu.p, expected_y);
        });
    }
}
