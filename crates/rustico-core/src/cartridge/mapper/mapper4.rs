//! Mapper 4 (MMC3): 8 KiB PRG windows, fine-grained CHR banking, and the
//! scanline IRQ counter clocked from PPU A12 rising edges.
//!
//! Games: Super Mario Bros. 3, Kirby's Adventure, and the majority of
//! licensed late-era NES carts.
//!
//! | Area | Address range | Behaviour                                      |
//! |------|----------------|-------------------------------------------------|
//! | CPU  | `$6000-$7FFF`  | Optional PRG-RAM, enable/write-protect via $A001|
//! | CPU  | `$8000-$9FFF`  | 8 KiB PRG window, fixed or switchable per mode  |
//! | CPU  | `$A000-$BFFF`  | 8 KiB PRG window (always switchable)            |
//! | CPU  | `$C000-$DFFF`  | 8 KiB PRG window, switchable or fixed per mode  |
//! | CPU  | `$E000-$FFFF`  | Fixed 8 KiB PRG window (last bank)              |
//! | PPU  | `$0000-$1FFF`  | 2x2 KiB + 4x1 KiB CHR banks, A12-inversion aware|
//! | PPU  | `$2000-$3EFF`  | Mirroring fixed by header or set via $A000      |

use std::borrow::Cow;

use crate::{
    cartridge::{
        ChrRom, Mapper, PrgRom, TrainerBytes,
        header::{Header, Mirroring, RomFormat},
        mapper::{
            ChrStorage, MapperEvent, MapperHookMask, PpuVramAccessContext, PpuVramAccessKind,
            allocate_prg_ram_with_trainer, select_chr_storage,
        },
    },
    memory::cpu as cpu_mem,
};

use crate::mem_block::ByteBlock;
use crate::reset_kind::ResetKind;

#[cfg(feature = "savestate-serde")]
use serde::{Deserialize, Serialize};

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_PAGE_SIZE: usize = 1024;

/// A12 must hold low for at least this many CPU cycles before a rise counts
/// as a clock edge, matching the filtering real MMC3 boards and Mesen2 both
/// apply (otherwise sprite-then-background fetches in the same scanline
/// would double-clock the counter).
const A12_LOW_QUALIFY_CPU_CYCLES: u64 = 3;
const MASTER_CLOCKS_PER_CPU_CYCLE: u64 = 12;

const PRG_WINDOW_8000: std::ops::RangeInclusive<u16> = 0x8000..=0x9FFF;
const PRG_WINDOW_A000: std::ops::RangeInclusive<u16> = 0xA000..=0xBFFF;
const PRG_WINDOW_C000: std::ops::RangeInclusive<u16> = 0xC000..=0xDFFF;
const PRG_WINDOW_E000: std::ops::RangeInclusive<u16> = 0xE000..=0xFFFF;

/// How the scanline counter signals an IRQ once it reaches zero; this split
/// in hardware behaviour between MMC3 silicon revisions (and the MMC6-style
/// boards some NES 2.0 dumps flag via submapper 1) only matters for games
/// that reload the counter to zero deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IrqZeroBehavior {
    /// Only fires when the counter actually counted down into zero this
    /// clock (a reload that lands on zero does not by itself assert IRQ).
    OnDecrementIntoZero,
    /// Fires whenever the counter reads zero after being clocked, reload or
    /// not.
    OnAnyZero,
}

impl IrqZeroBehavior {
    fn encode(self) -> u8 {
        matches!(self, IrqZeroBehavior::OnAnyZero) as u8
    }

    fn decode(bit: u8) -> Self {
        if bit != 0 {
            IrqZeroBehavior::OnAnyZero
        } else {
            IrqZeroBehavior::OnDecrementIntoZero
        }
    }

    fn from_header(header: Header) -> Self {
        if let Some(forced) = irq_behavior_override() {
            return forced;
        }
        // Legacy iNES mapper-4 dumps carry no board-revision information;
        // only a NES 2.0 submapper-1 tag (MMC6-family) is specific enough to
        // pick the decrement-sensitive variant.
        if header.format() == RomFormat::Nes20 && header.submapper() == 1 {
            IrqZeroBehavior::OnDecrementIntoZero
        } else {
            IrqZeroBehavior::OnAnyZero
        }
    }
}

fn irq_behavior_override() -> Option<IrqZeroBehavior> {
    let value = std::env::var("RUSTICO_MMC3_IRQ_BEHAVIOR").ok()?;
    match value.trim().to_ascii_uppercase().as_str() {
        "DECREMENT" | "REVA" | "MMC6" => Some(IrqZeroBehavior::OnDecrementIntoZero),
        "ANY" | "REVB" => Some(IrqZeroBehavior::OnAnyZero),
        _ => None,
    }
}

/// Layout of the six CHR page registers, which swaps between "normal" and
/// "A12-inverted" depending on bank-select bit 7.
#[derive(Debug, Clone, Copy)]
struct ChrLayout {
    /// `(register index, forced-even, region size in bytes)` for each of the
    /// six 1 KiB slices of the $0000-$1FFF pattern table window, in address
    /// order.
    slots: [(usize, bool, usize); 6],
}

const CHR_LAYOUT_NORMAL: ChrLayout = ChrLayout {
    slots: [
        (0, true, 2 * CHR_PAGE_SIZE),
        (1, true, 2 * CHR_PAGE_SIZE),
        (2, false, CHR_PAGE_SIZE),
        (3, false, CHR_PAGE_SIZE),
        (4, false, CHR_PAGE_SIZE),
        (5, false, CHR_PAGE_SIZE),
    ],
};

const CHR_LAYOUT_INVERTED: ChrLayout = ChrLayout {
    slots: [
        (2, false, CHR_PAGE_SIZE),
        (3, false, CHR_PAGE_SIZE),
        (4, false, CHR_PAGE_SIZE),
        (5, false, CHR_PAGE_SIZE),
        (0, true, 2 * CHR_PAGE_SIZE),
        (1, true, 2 * CHR_PAGE_SIZE),
    ],
};

impl ChrLayout {
    /// Resolves `addr` (already masked to `$0000-$1FFF`) to a `(bank_base,
    /// offset_within_bank)` pair against the given register file.
    fn resolve(&self, addr: u16, bank_regs: &Mapper4BankRegs) -> (usize, usize) {
        let addr = addr as usize;
        let mut base_addr = 0usize;
        for &(reg_index, force_even, size) in &self.slots {
            if addr < base_addr + size {
                let mut bank = bank_regs[reg_index] as usize;
                if force_even {
                    bank &= !1;
                }
                return (bank * CHR_PAGE_SIZE, addr - base_addr);
            }
            base_addr += size;
        }
        unreachable!("six slots cover the full $0000-$1FFF range")
    }
}

type Mapper4BankRegs = ByteBlock<8>;

#[derive(Debug, Clone)]
pub struct Mapper4 {
    prg_rom: crate::cartridge::PrgRom,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    prg_bank_count: usize,

    base_mirroring: Mirroring,
    mirroring: Mirroring,

    /// $8000: bit0-2 select which of `bank_regs` $8001 writes target, bit6
    /// picks the PRG swap mode, bit7 picks the CHR layout.
    bank_select: u8,
    bank_regs: Mapper4BankRegs,

    prg_ram_enable: bool,
    prg_ram_write_protect: bool,

    irq_latch: u8,
    irq_counter: u8,
    /// Set by a $C001 write; forces the next qualifying A12 edge to reload
    /// from `irq_latch` rather than decrement.
    irq_reload_pending: bool,
    irq_enabled: bool,
    irq_pending: bool,
    irq_zero_behavior: IrqZeroBehavior,

    /// Master-clock timestamp where A12 was last observed going low, or
    /// `None` while A12 is high / no low phase has been armed yet.
    a12_fell_at: Option<u64>,
}

#[cfg_attr(feature = "savestate-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapper4State {
    pub base_mirroring: u8,
    pub mirroring: u8,
    pub bank_select: u8,
    pub bank_regs: [u8; 8],
    pub prg_ram_enable: bool,
    pub prg_ram_write_protect: bool,
    pub irq_latch: u8,
    pub irq_counter: u8,
    pub irq_reload: bool,
    pub irq_enabled: bool,
    pub irq_pending: bool,
    pub irq_revision: u8,
    pub a12_low_start_master_clock: Option<u64>,
}

impl Mapper4 {
    pub fn new(header: Header, prg_rom: PrgRom, chr_rom: ChrRom, trainer: TrainerBytes) -> Self {
        let prg_ram = allocate_prg_ram_with_trainer(&header, trainer);
        let chr = select_chr_storage(&header, chr_rom.into());
        let prg_bank_count = (prg_rom.len() / PRG_BANK_SIZE).max(1);

        Self {
            prg_rom,
            prg_ram,
            chr,
            prg_bank_count,
            base_mirroring: header.mirroring(),
            mirroring: header.mirroring(),
            bank_select: 0,
            bank_regs: Mapper4BankRegs::new(),
            prg_ram_enable: true,
            prg_ram_write_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload_pending: false,
            irq_enabled: false,
            irq_pending: false,
            irq_zero_behavior: IrqZeroBehavior::from_header(header),
            a12_fell_at: None,
        }
    }

    pub(crate) fn save_state(&self) -> Mapper4State {
        let mut regs = [0u8; 8];
        regs.copy_from_slice(self.bank_regs.as_slice());
        Mapper4State {
            base_mirroring: mirroring_to_u8(self.base_mirroring),
            mirroring: mirroring_to_u8(self.mirroring),
            bank_select: self.bank_select,
            bank_regs: regs,
            prg_ram_enable: self.prg_ram_enable,
            prg_ram_write_protect: self.prg_ram_write_protect,
            irq_latch: self.irq_latch,
            irq_counter: self.irq_counter,
            irq_reload: self.irq_reload_pending,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            irq_revision: self.irq_zero_behavior.encode(),
            a12_low_start_master_clock: self.a12_fell_at,
        }
    }

    pub(crate) fn load_state(&mut self, state: &Mapper4State) {
        self.base_mirroring = mirroring_from_u8(state.base_mirroring);
        self.mirroring = mirroring_from_u8(state.mirroring);
        self.bank_select = state.bank_select;
        self.bank_regs
            .as_mut_slice()
            .copy_from_slice(&state.bank_regs);
        self.prg_ram_enable = state.prg_ram_enable;
        self.prg_ram_write_protect = state.prg_ram_write_protect;
        self.irq_latch = state.irq_latch;
        self.irq_counter = state.irq_counter;
        self.irq_reload_pending = state.irq_reload;
        self.irq_enabled = state.irq_enabled;
        self.irq_pending = state.irq_pending;
        self.irq_zero_behavior = IrqZeroBehavior::decode(state.irq_revision);
        self.a12_fell_at = state.a12_low_start_master_clock;
    }

    fn chr_layout(&self) -> &'static ChrLayout {
        if self.bank_select & 0x80 != 0 {
            &CHR_LAYOUT_INVERTED
        } else {
            &CHR_LAYOUT_NORMAL
        }
    }

    /// `false`: $8000 swaps, $C000 fixed to the second-to-last bank. `true`:
    /// the reverse.
    fn swap_window_is_c000(&self) -> bool {
        self.bank_select & 0x40 != 0
    }

    fn prg_ram_enabled(&self) -> bool {
        !self.prg_ram.is_empty() && self.prg_ram_enable
    }

    fn read_prg_ram(&self, addr: u16) -> Option<u8> {
        if !self.prg_ram_enabled() {
            return None;
        }
        let idx = (addr - cpu_mem::PRG_RAM_START) as usize % self.prg_ram.len();
        Some(self.prg_ram[idx])
    }

    fn write_prg_ram(&mut self, addr: u16, data: u8) {
        if !self.prg_ram_enabled() || self.prg_ram_write_protect {
            return;
        }
        let idx = (addr - cpu_mem::PRG_RAM_START) as usize % self.prg_ram.len();
        self.prg_ram[idx] = data;
    }

    fn prg_bank_index(&self, reg_value: u8) -> usize {
        if self.prg_bank_count == 0 {
            0
        } else {
            (reg_value as usize) % self.prg_bank_count
        }
    }

    fn read_prg_rom(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }

        let last = self.prg_bank_count.saturating_sub(1);
        let second_last = self.prg_bank_count.saturating_sub(2);
        let switchable_low = self.prg_bank_index(self.bank_regs[6]);
        let switchable_high = self.prg_bank_index(self.bank_regs[7]);

        let (window_8000, window_c000) = if self.swap_window_is_c000() {
            (second_last, switchable_low)
        } else {
            (switchable_low, second_last)
        };

        let bank = match addr {
            a if PRG_WINDOW_8000.contains(&a) => window_8000,
            a if PRG_WINDOW_A000.contains(&a) => switchable_high,
            a if PRG_WINDOW_C000.contains(&a) => window_c000,
            _ => last,
        };

        let base = bank.saturating_mul(PRG_BANK_SIZE);
        let offset = (addr as usize - cpu_mem::PRG_ROM_START as usize) & (PRG_BANK_SIZE - 1);
        self.prg_rom.get(base.saturating_add(offset)).copied().unwrap_or(0)
    }

    fn write_bank_select(&mut self, data: u8) {
        self.bank_select = data;
    }

    fn write_bank_data(&mut self, data: u8) {
        let index = (self.bank_select & 0x07) as usize;
        if index < self.bank_regs.len() {
            // R0/R1 ignore their low bit on real hardware (A10 is tied low
            // for the 2 KiB windows); we keep the raw value and mask it only
            // where it's consumed, so a savestate round-trip is lossless.
            self.bank_regs[index] = data;
        }
    }

    fn write_mirroring(&mut self, data: u8) {
        if self.base_mirroring == Mirroring::FourScreen {
            // Four-screen boards wire mirroring through dedicated VRAM and
            // ignore the $A000 control bit entirely.
            return;
        }
        self.mirroring = if data & 0x01 == 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
    }

    fn write_prg_ram_protect(&mut self, data: u8) {
        self.prg_ram_enable = data & 0x80 != 0;
        self.prg_ram_write_protect = data & 0x40 != 0;
    }

    fn write_irq_reload(&mut self) {
        self.irq_counter = 0;
        self.irq_reload_pending = true;
    }

    fn write_irq_disable(&mut self) {
        self.irq_enabled = false;
        self.irq_pending = false;
    }

    /// Runs one tick of the scanline counter; called from
    /// [`Mapper4::observe_ppu_vram_access`] on a qualified A12 rise.
    fn clock_irq_counter(&mut self) {
        let counter_before = self.irq_counter;
        let reload_was_requested = self.irq_reload_pending;

        if reload_was_requested || counter_before == 0 {
            self.irq_counter = self.irq_latch;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter != 0 || !self.irq_enabled {
            return;
        }
        // `OnDecrementIntoZero` boards skip the assert only when this clock
        // did nothing but reload an already-zero counter with no explicit
        // reload request behind it; every other path to zero still fires.
        let fires = match self.irq_zero_behavior {
            IrqZeroBehavior::OnAnyZero => true,
            IrqZeroBehavior::OnDecrementIntoZero => counter_before != 0 || reload_was_requested,
        };
        if fires {
            self.irq_pending = true;
        }
    }

    /// `true` exactly once per qualifying A12 rise (after at least
    /// [`A12_LOW_QUALIFY_CPU_CYCLES`] CPU cycles of being low).
    fn qualifies_as_a12_rise(&mut self, addr: u16, ppu_master_clock: u64) -> bool {
        let a12_high = addr & 0x1000 != 0;
        if !a12_high {
            self.a12_fell_at.get_or_insert(ppu_master_clock);
            return false;
        }
        let low_threshold = A12_LOW_QUALIFY_CPU_CYCLES * MASTER_CLOCKS_PER_CPU_CYCLE;
        let rose = self
            .a12_fell_at
            .is_some_and(|fell_at| ppu_master_clock.saturating_sub(fell_at) >= low_threshold);
        self.a12_fell_at = None;
        rose
    }

    fn observe_ppu_vram_access(&mut self, addr: u16, ctx: PpuVramAccessContext) {
        let counts_toward_a12 = matches!(
            ctx.kind,
            PpuVramAccessKind::RenderingFetch
                | PpuVramAccessKind::CpuRead
                | PpuVramAccessKind::CpuWrite
        );
        if counts_toward_a12 && self.qualifies_as_a12_rise(addr, ctx.ppu_master_clock) {
            self.clock_irq_counter();
        }
    }
}

impl Mapper for Mapper4 {
    fn hook_mask(&self) -> MapperHookMask {
        MapperHookMask::PPU_BUS_ADDRESS
    }

    fn on_mapper_event(&mut self, event: MapperEvent) {
        if let MapperEvent::PpuBusAddress { addr, ctx } = event {
            self.observe_ppu_vram_access(addr, ctx);
        }
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.bank_select = 0x40;
        self.bank_regs.fill(0);
        self.prg_ram_enable = true;
        self.prg_ram_write_protect = false;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload_pending = false;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.a12_fell_at = None;
        self.mirroring = self.base_mirroring;
    }

    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => self.read_prg_ram(addr),
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg_rom(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8, _cpu_cycle: u64) {
        if (cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END).contains(&addr) {
            self.write_prg_ram(addr, data);
            return;
        }

        let even = addr & 1 == 0;
        match addr {
            a if PRG_WINDOW_8000.contains(&a) && even => self.write_bank_select(data),
            a if PRG_WINDOW_8000.contains(&a) => self.write_bank_data(data),
            a if PRG_WINDOW_A000.contains(&a) && even => self.write_mirroring(data),
            a if PRG_WINDOW_A000.contains(&a) => self.write_prg_ram_protect(data),
            a if PRG_WINDOW_C000.contains(&a) && even => self.irq_latch = data,
            a if PRG_WINDOW_C000.contains(&a) => self.write_irq_reload(),
            a if PRG_WINDOW_E000.contains(&a) && even => self.write_irq_disable(),
            a if PRG_WINDOW_E000.contains(&a) => self.irq_enabled = true,
            _ => {}
        }
    }

    fn ppu_read(&self, addr: u16) -> Option<u8> {
        let addr = addr & 0x1FFF;
        let (base, offset) = self.chr_layout().resolve(addr, &self.bank_regs);
        Some(self.chr.read_indexed(base, offset))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        let addr = addr & 0x1FFF;
        let (base, offset) = self.chr_layout().resolve(addr, &self.bank_regs);
        self.chr.write_indexed(base, offset, data);
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    fn prg_rom(&self) -> Option<&[u8]> {
        Some(self.prg_rom.as_ref())
    }

    fn prg_ram(&self) -> Option<&[u8]> {
        (!self.prg_ram.is_empty()).then(|| self.prg_ram.as_ref())
    }

    fn prg_ram_mut(&mut self) -> Option<&mut [u8]> {
        (!self.prg_ram.is_empty()).then(|| self.prg_ram.as_mut())
    }

    fn chr_rom(&self) -> Option<&[u8]> {
        self.chr.as_rom()
    }

    fn chr_ram(&self) -> Option<&[u8]> {
        self.chr.as_ram()
    }

    fn chr_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.chr.as_ram_mut()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        4
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("MMC3")
    }
}

fn mirroring_to_u8(m: Mirroring) -> u8 {
    match m {
        Mirroring::Horizontal => 0,
        Mirroring::Vertical => 1,
        Mirroring::FourScreen => 2,
        Mirroring::SingleScreenLower => 3,
        Mirroring::SingleScreenUpper => 4,
        Mirroring::MapperControlled => 5,
    }
}

fn mirroring_from_u8(v: u8) -> Mirroring {
    match v {
        0 => Mirroring::Horizontal,
        1 => Mirroring::Vertical,
        2 => Mirroring::FourScreen,
        3 => Mirroring::SingleScreenLower,
        4 => Mirroring::SingleScreenUpper,
        5 => Mirroring::MapperControlled,
        _ => Mirroring::Horizontal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::{RomFormat, TvSystem};

    fn test_header(prg_rom_size: usize) -> Header {
        Header {
            format: RomFormat::INes,
            mapper: 4,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed_ram: false,
            trainer_present: false,
            prg_rom_size,
            chr_rom_size: 8 * 1024,
            prg_ram_size: 8 * 1024,
            prg_nvram_size: 0,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            vs_unisystem: false,
            playchoice_10: false,
            tv_system: TvSystem::Ntsc,
        }
    }

    fn mapper_with_banks(prg_banks: usize) -> Mapper4 {
        let header = test_header(prg_banks * PRG_BANK_SIZE);
        let prg_rom = vec![0u8; prg_banks * PRG_BANK_SIZE].into();
        let chr_rom = vec![0u8; 8 * 1024].into();
        Mapper4::new(header, prg_rom, chr_rom, None)
    }

    #[test]
    fn counter_fires_irq_on_zero_under_any_zero_behavior() {
        let mut m = mapper_with_banks(4);
        m.irq_zero_behavior = IrqZeroBehavior::OnAnyZero;
        m.irq_enabled = true;
        m.irq_latch = 0;
        m.clock_irq_counter();
        assert!(m.irq_pending());
    }

    #[test]
    fn disable_write_clears_pending_irq() {
        let mut m = mapper_with_banks(4);
        m.irq_enabled = true;
        m.irq_pending = true;
        m.write_irq_disable();
        assert!(!m.irq_pending());
        assert!(!m.irq_enabled);
    }

    #[test]
    fn prg_mode_0_fixes_c000_to_second_to_last_bank() {
        let mut m = mapper_with_banks(4);
        m.write_bank_select(0x00); // mode 0, CHR normal
        assert_eq!(
            m.read_prg_rom(0xC000),
            m.prg_rom[2 * PRG_BANK_SIZE] // second-to-last of 4 banks
        );
    }

    #[test]
    fn four_screen_header_ignores_mirroring_writes() {
        let mut m = mapper_with_banks(2);
        m.base_mirroring = Mirroring::FourScreen;
        m.mirroring = Mirroring::FourScreen;
        m.write_mirroring(0x01);
        assert_eq!(m.mirroring(), Mirroring::FourScreen);
    }
}
