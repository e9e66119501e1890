use crate::bus::Bus;
use crate::cpu::instruction::Instruction;
use crate::cpu::lookup::LOOKUP_TABLE;
use crate::cpu::mnemonic::Mnemonic;
use crate::cpu::status::Status;
use crate::reset_kind::ResetKind;

mod status;

mod addressing;
mod cycle;
mod instruction;
mod lookup;
pub(crate) mod mnemonic;
mod operand;

/// The 6502 core, minus anything that isn't register/bus-visible state.
///
/// Execution is instruction-atomic rather than a resumable per-cycle state
/// machine: [`Cpu::step`] decodes and fully runs one instruction, returning
/// the number of CPU cycles it consumed so the caller can advance the PPU/APU
/// and any pending DMA by that many ticks. [`Mnemonic::exec`] is still called
/// once per cycle of the instruction's *operation* phase (see
/// [`mnemonic::Mnemonic::exec_len`]) so per-mnemonic tests can assert on
/// individual cycles, but only the final cycle performs bus-visible work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Cpu {
    pub(crate) a: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) s: u8,
    pub(crate) p: Status,
    pub(crate) pc: u16,

    /// Opcode byte of the instruction currently being executed, set by
    /// [`Cpu::step`]/[`Cpu::test_clock`] before dispatching to
    /// [`mnemonic::Mnemonic::exec`].
    pub(crate) opcode_in_flight: Option<u8>,

    /// Effective address of the current instruction's operand, resolved once
    /// by [`Cpu::step`]/[`Cpu::test_clock`] while `pc` still points at the
    /// opcode. `exec` steps read this instead of re-resolving addressing,
    /// since by the time they run `pc` has already advanced past the operand.
    pub(crate) effective_addr: u16,

    /// The operand byte at `effective_addr`, resolved at the same time (0 for
    /// addressing modes that don't read memory, e.g. JMP/JSR's target).
    pub(crate) operand_value: u8,

    /// Scratch byte for read-modify-write instructions (DEC, INC, the shift
    /// group, and their illegal RMW-combo counterparts), carried between
    /// [`mnemonic::Mnemonic::exec`] steps of the same instruction.
    pub(crate) pending_rmw: u8,

    /// Level of [`Bus::nmi_line`] observed at the end of the previous
    /// instruction, used to edge-detect a rising NMI between instructions.
    nmi_line_prev: bool,
}

/// Interrupt latched by [`Cpu::poll_interrupts`] to be serviced before the
/// next opcode fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingInterrupt {
    Nmi,
    Irq,
}

impl Cpu {
    pub(crate) fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            p: Status::new(),
            pc: 0,
            opcode_in_flight: None,
            effective_addr: 0,
            operand_value: 0,
            pending_rmw: 0,
            nmi_line_prev: false,
        }
    }

    /// Loads the program counter from the reset/IRQ/NMI vector appropriate to
    /// `kind` and puts the stack pointer/flags in their post-reset state.
    pub(crate) fn reset<B: Bus>(&mut self, bus: &mut B, kind: ResetKind) {
        match kind {
            ResetKind::PowerOn => {
                self.a = 0;
                self.x = 0;
                self.y = 0;
                self.s = 0xFD;
                self.p = Status::new();
            }
            ResetKind::Soft => {
                self.s = self.s.wrapping_sub(3);
                self.p.set_i(true);
            }
        }
        self.opcode_in_flight = None;
        self.pc = Self::read_vector(bus, 0xFFFC);
        // Sample the NMI line at reset so the first instruction doesn't see
        // a spurious rising edge from whatever level the PPU happened to be
        // driving before reset.
        self.nmi_line_prev = bus.nmi_line();
    }

    fn read_vector<B: Bus>(bus: &mut B, addr: u16) -> u16 {
        u16::from_le_bytes([bus.read(addr), bus.read(addr.wrapping_add(1))])
    }

    pub(crate) fn nmi_vector<B: Bus>(bus: &mut B) -> u16 {
        Self::read_vector(bus, 0xFFFA)
    }

    pub(crate) fn irq_vector<B: Bus>(bus: &mut B) -> u16 {
        Self::read_vector(bus, 0xFFFE)
    }

    pub(crate) fn current_instruction(&self) -> &'static Instruction {
        let opcode = self
            .opcode_in_flight
            .expect("exec dispatched without an opcode in flight");
        &LOOKUP_TABLE[opcode as usize]
    }

    pub(crate) fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 + self.s as u16, value);
        self.s = self.s.wrapping_sub(1);
    }

    pub(crate) fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read(0x0100 + self.s as u16)
    }

    pub(crate) fn push_u16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    pub(crate) fn pull_u16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Runs one full instruction starting at `pc`, advancing it past the
    /// opcode and any operand bytes before dispatching to [`Mnemonic::exec`].
    /// Returns the number of CPU cycles consumed, including any page-cross
    /// penalty or taken-branch penalty.
    pub(crate) fn step<B: Bus>(&mut self, bus: &mut B) -> u8 {
        if let Some(interrupt) = self.poll_interrupts(bus) {
            return self.service_interrupt(bus, interrupt);
        }

        let opcode = bus.read(self.pc);
        self.opcode_in_flight = Some(opcode);
        let instr = &LOOKUP_TABLE[opcode as usize];
        let operand = instr.addressing.operand(self, bus);
        self.effective_addr = operand.addr;
        self.operand_value = operand.value;
        let fallthrough_pc = self.pc.wrapping_add(1 + instr.addressing.operand_len());
        self.pc = fallthrough_pc;

        let mnemonic = instr.mnemonic;
        for step in 0..mnemonic.exec_len() {
            mnemonic.exec(self, bus, step);
        }
        // JMP has no per-cycle operation to run exec for; it jumps by simply
        // never falling through to the fetched-operand address.
        if mnemonic == Mnemonic::JMP {
            self.pc = operand.addr;
        }
        // A taken branch (or any control-flow instruction) leaves the PC set
        // to something other than the plain fallthrough address.
        let branch_taken = self.pc != fallthrough_pc;
        instr.cycle().total_cycle(operand.crossed_page, branch_taken)
    }

    /// NMI is edge-triggered on the rising edge of [`Bus::nmi_line`]; IRQ is
    /// a level polled only while the I flag is clear. Called once at the
    /// start of every [`Cpu::step`], before the next opcode is fetched.
    fn poll_interrupts<B: Bus>(&mut self, bus: &mut B) -> Option<PendingInterrupt> {
        let nmi_line = bus.nmi_line();
        let nmi_edge = nmi_line && !self.nmi_line_prev;
        self.nmi_line_prev = nmi_line;
        if nmi_edge {
            return Some(PendingInterrupt::Nmi);
        }
        if !self.p.i() && bus.irq_pending() {
            return Some(PendingInterrupt::Irq);
        }
        None
    }

    /// Runs the 7-cycle interrupt sequence in place of an opcode fetch: two
    /// dummy reads of the current `pc`, then push `pc`/`p` (with B clear,
    /// matching real hardware's distinction between BRK and a hardware
    /// interrupt), set I, and load `pc` from the appropriate vector.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B, interrupt: PendingInterrupt) -> u8 {
        let _ = bus.read(self.pc);
        let _ = bus.read(self.pc);
        self.push_u16(bus, self.pc);
        let p = (self.p & !Status::BREAK) | Status::UNUSED;
        self.push(bus, p.to_byte());
        self.p.set_i(true);
        self.pc = match interrupt {
            PendingInterrupt::Nmi => Self::nmi_vector(bus),
            PendingInterrupt::Irq => {
                bus.clear_irq();
                Self::irq_vector(bus)
            }
        };
        7
    }

    /// Raw NV-BDIZC status byte, for save states (the `Status` type itself
    /// is private to this module).
    pub(crate) fn status_byte(&self) -> u8 {
        self.p.to_byte()
    }

    pub(crate) fn set_status_byte(&mut self, byte: u8) {
        self.p = Status::from_byte(byte);
    }

    /// Edge-detect latch for [`Bus::nmi_line`], exposed for save states.
    pub(crate) fn nmi_line_prev(&self) -> bool {
        self.nmi_line_prev
    }

    pub(crate) fn set_nmi_line_prev(&mut self, value: bool) {
        self.nmi_line_prev = value;
    }

    /// Test-only driver used by `mnemonic::tests::InstrTest`: runs the
    /// instruction already encoded at `cpu.pc` in `bus` and returns the
    /// number of cycles it consumed.
    #[cfg(test)]
    pub(crate) fn test_clock<B: Bus>(&mut self, bus: &mut B, instr: &Instruction) -> u8 {
        self.opcode_in_flight = Some(instr.opcode());
        let operand = instr.addressing.operand(self, bus);
        self.effective_addr = operand.addr;
        self.operand_value = operand.value;
        let fallthrough_pc = self.pc.wrapping_add(1 + instr.addressing.operand_len());
        self.pc = fallthrough_pc;

        for step in 0..instr.mnemonic.exec_len() {
            instr.mnemonic.exec(self, bus, step);
        }
        if instr.mnemonic == Mnemonic::JMP {
            self.pc = operand.addr;
        }

        let branch_taken = self.pc != fallthrough_pc;
        instr.cycle().total_cycle(operand.crossed_page, branch_taken)
    }
}
