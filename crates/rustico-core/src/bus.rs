use crate::memory;

pub mod cpu;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod open_bus;
pub(crate) mod savestate;

pub use cpu::CpuBus;
pub(crate) use open_bus::OpenBus;

/// Expose the CPU stack page start address for stack helpers.
pub(crate) const STACK_ADDR: u16 = memory::cpu::STACK_PAGE_START;

/// The memory bus the CPU core executes against. A single `read`/`write`
/// pair stands in for one 6502 bus cycle; everything else (PPU/APU ticking,
/// open-bus decay, mapper IRQ lines, OAM/DMC DMA) happens behind it.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Level of the interrupt line that drives NMI (the PPU's
    /// VBlank-and-NMI-enabled output). [`Cpu::step`](crate::cpu::Cpu::step)
    /// edge-detects this itself; an NMI fires on the line's rising edge, not
    /// for as long as it stays asserted. Defaults to never-asserted for
    /// buses with nothing to drive it (mocks, test doubles).
    fn nmi_line(&mut self) -> bool {
        false
    }

    /// Level signal: true while the APU frame/DMC IRQ or a mapper IRQ is
    /// asserted. Polled at each instruction boundary when the I flag is
    /// clear.
    fn irq_pending(&mut self) -> bool {
        false
    }

    /// Acknowledges whichever IRQ sources are currently asserted. Called
    /// once an IRQ has been serviced (its vector fetched).
    fn clear_irq(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "savestate-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum DmcDmaEvent {
    Request { addr: u16 },
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "savestate-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PendingDma {
    pub oam_page: Option<u8>,
    pub dmc: Option<DmcDmaEvent>,
}
