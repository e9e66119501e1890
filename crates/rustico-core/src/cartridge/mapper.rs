//! Cartridge mapper registry, traits, and shared helpers.
//!
//! This module wires together the concrete mapper implementations, defines the
//! core [`Mapper`] trait they implement, and exposes a few small helpers for
//! PRG RAM allocation and trainer placement that are reused across mappers.

use std::{any::Any, borrow::Cow, fmt::Debug};

use dyn_clone::DynClone;

pub mod chr_storage;
pub mod mapper0;
pub mod mapper1;
pub mod mapper10;
pub mod mapper11;
pub mod mapper119;
pub mod mapper13;
pub mod mapper19;
pub mod mapper2;
pub mod mapper21;
pub mod mapper228;
pub mod mapper23;
pub mod mapper25;
pub mod mapper26;
pub mod mapper3;
pub mod mapper34;
pub mod mapper4;
pub mod mapper5;
pub mod mapper6;
pub mod mapper66;
pub mod mapper7;
pub mod mapper71;
pub mod mapper78;
pub mod mapper8;
pub mod mapper85;
pub mod mapper9;
pub mod mapper90;
pub mod provider;

pub(crate) use chr_storage::{ChrStorage, select_chr_storage};
pub use mapper0::Mapper0;
pub use mapper1::Mapper1;
pub use mapper2::Mapper2;
pub use mapper3::Mapper3;
pub use mapper4::Mapper4;
pub use mapper5::Mapper5;
pub use mapper6::Mapper6;
pub use mapper7::Mapper7;
pub use mapper8::Mapper8;
pub use mapper9::Mapper9;
pub use mapper10::Mapper10;
pub use mapper11::Mapper11;
pub use mapper13::Mapper13;
pub use mapper19::Mapper19;
pub use mapper21::Mapper21;
pub use mapper23::Mapper23;
pub use mapper25::Mapper25;
pub use mapper26::Mapper26;
pub use mapper34::Mapper34;
pub use mapper66::Mapper66;
pub use mapper71::Mapper71;
pub use mapper78::Mapper78;
pub use mapper85::Mapper85;
pub use mapper90::Mapper90;
pub use mapper119::Mapper119;
pub use mapper228::Mapper228;
pub use provider::Provider;

use crate::{
    apu::ExpansionAudio,
    cartridge::{header::Header, header::Mirroring, TRAINER_SIZE, TrainerBytes},
    memory::cpu as cpu_mem,
    reset_kind::ResetKind,
};

/// CPU address at which the optional 512 byte trainer is mapped into PRG RAM.
const TRAINER_BASE_ADDR: u16 = 0x7000;
/// Offset of the trainer region within the PRG RAM window.
const TRAINER_RAM_OFFSET: usize = (TRAINER_BASE_ADDR - cpu_mem::PRG_RAM_START) as usize;

/// Reason the PPU touched its VRAM address bus, passed to mappers that watch
/// A12 transitions (MMC3-style scanline counters) or otherwise react to PPU
/// bus timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PpuVramAccessKind {
    /// Background/sprite pattern or nametable fetch performed by rendering.
    RenderingFetch,
    /// CPU read through `$2007`.
    CpuRead,
    /// CPU write through `$2007`.
    CpuWrite,
}

/// Timing/classification context attached to a PPU VRAM bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PpuVramAccessContext {
    /// PPU dot-domain cycle counter at the time of the access.
    pub ppu_cycle: u64,
    /// PPU master-clock counter at the time of the access (4 master clocks
    /// per PPU dot), used by A12-edge IRQ counters that qualify the low
    /// period in master-clock units.
    pub ppu_master_clock: u64,
    /// CPU bus cycle counter at the time of the access.
    pub cpu_cycle: u64,
    pub kind: PpuVramAccessKind,
}

/// Kind of CPU bus access reported to mappers that watch `$4020-$FFFF`
/// traffic outside of their own register windows (e.g. FME-7, VRC IRQ
/// counters clocked from CPU cycles rather than PPU A12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuBusAccessKind {
    Read,
    Write,
}

/// Resolution of a PPU nametable address ($2000-$3EFF) to its backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NametableTarget {
    /// Backed by the console's internal 2 KiB CIRAM, at the given offset.
    Ciram(u16),
    /// Backed by mapper-provided VRAM/ROM (four-screen boards, FDS extra
    /// RAM, MMC5 ExRAM nametables), at the given offset.
    MapperVram(u16),
    /// No backing store; reads return open bus, writes are ignored.
    None,
}

bitflags::bitflags! {
    /// Declares which [`MapperEvent`] notifications a mapper wants to
    /// receive. Most mappers don't need any of these hooks, so the bus only
    /// pays for the dispatch when a mapper opts in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapperHookMask: u8 {
        /// Receive [`MapperEvent::PpuBusAddress`] on every PPU VRAM access.
        const PPU_BUS_ADDRESS = 1 << 0;
        /// Receive [`MapperEvent::CpuBusAccess`] on every CPU bus access.
        const CPU_BUS_ACCESS = 1 << 1;
        /// Receive a call to [`Mapper::ppu_read_override`] after each PPU
        /// VRAM read so the mapper can substitute its own value.
        const PPU_READ_OVERRIDE = 1 << 2;
    }
}

/// Bus event delivered to [`Mapper::on_mapper_event`] for mappers that
/// declare interest via [`Mapper::hook_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperEvent {
    /// The PPU placed `addr` on its VRAM address bus.
    PpuBusAddress {
        addr: u16,
        ctx: PpuVramAccessContext,
    },
    /// The CPU performed a bus access at `addr`.
    CpuBusAccess {
        kind: CpuBusAccessKind,
        addr: u16,
        value: u8,
        cpu_cycle: u64,
        master_clock: u64,
    },
}

/// Core mapper interface implemented by all cartridge boards.
pub trait Mapper: Debug + DynClone + Any + 'static {
    fn cpu_read(&self, addr: u16) -> Option<u8>;

    fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64);

    fn ppu_read(&self, addr: u16) -> Option<u8>;

    fn ppu_write(&mut self, addr: u16, data: u8);

    /// Convenience CHR read ($0000-$1FFF) that always returns a byte; used
    /// by the PPU's direct CHR bus path rather than the `$2007` VRAM path.
    fn chr_read(&self, addr: u16) -> u8 {
        self.ppu_read(addr).unwrap_or(0)
    }

    /// Convenience CHR write ($0000-$1FFF) for CHR-RAM mappers.
    fn chr_write(&mut self, addr: u16, data: u8) {
        self.ppu_write(addr, data);
    }

    /// Current nametable mirroring mode.
    fn mirroring(&self) -> Mirroring;

    /// Resolve a PPU nametable address to its backing storage. Defaults to
    /// the standard CIRAM mapping derived from [`Mapper::mirroring`].
    fn map_nametable(&self, addr: u16) -> NametableTarget {
        let table = ((addr >> 10) & 0x3) as u16;
        let offset = addr & 0x03FF;
        let ciram_page = match (self.mirroring(), table) {
            (Mirroring::Horizontal, 0) | (Mirroring::Horizontal, 1) => 0,
            (Mirroring::Horizontal, _) => 1,
            (Mirroring::Vertical, 0) | (Mirroring::Vertical, 2) => 0,
            (Mirroring::Vertical, _) => 1,
            (Mirroring::SingleScreenLower, _) => 0,
            (Mirroring::SingleScreenUpper, _) => 1,
            // Four-screen/mapper-controlled boards without a VRAM override
            // fall back to a flat 2 KiB mapping rather than aliasing tables.
            (Mirroring::FourScreen, t) | (Mirroring::MapperControlled, t) => t,
        };
        NametableTarget::Ciram(ciram_page * 0x0400 + offset)
    }

    /// Mapper-controlled nametable read when [`Mapper::map_nametable`]
    /// selects [`NametableTarget::MapperVram`].
    fn mapper_nametable_read(&self, _offset: u16) -> u8 {
        0
    }

    /// Mapper-controlled nametable write when [`Mapper::map_nametable`]
    /// selects [`NametableTarget::MapperVram`].
    fn mapper_nametable_write(&mut self, _offset: u16, _value: u8) {}

    /// Resets mapper-internal state. Applied once after construction with
    /// [`ResetKind::PowerOn`], and again on console reset.
    fn reset(&mut self, _kind: ResetKind) {}

    /// Per CPU-cycle tick, used by mappers with CPU-clocked IRQ counters
    /// (e.g. FME-7, VRC-style boards) that aren't driven off PPU A12.
    fn cpu_clock(&mut self, _cpu_cycle: u64) {}

    /// Notifies the mapper of a PPU VRAM bus access, for mappers (e.g.
    /// MMC2/MMC4-style latch boards) that react to the raw address rather
    /// than through [`Mapper::on_mapper_event`]'s [`MapperHookMask`] gating.
    fn ppu_vram_access(&mut self, _addr: u16, _ctx: PpuVramAccessContext) {}

    /// Hooks this mapper wants dispatched through [`Mapper::on_mapper_event`].
    fn hook_mask(&self) -> MapperHookMask {
        MapperHookMask::empty()
    }

    /// Delivers a bus event this mapper opted into via [`Mapper::hook_mask`].
    fn on_mapper_event(&mut self, _event: MapperEvent) {}

    /// Allows mappers to post-process the value returned for a PPU VRAM
    /// read, when [`MapperHookMask::PPU_READ_OVERRIDE`] is set.
    fn ppu_read_override(&mut self, _addr: u16, _ctx: PpuVramAccessContext, value: u8) -> u8 {
        value
    }

    /// Exposes this mapper's expansion audio channel, if it has one.
    fn as_expansion_audio(&self) -> Option<&dyn ExpansionAudio> {
        None
    }

    /// Mutable counterpart of [`Mapper::as_expansion_audio`].
    fn as_expansion_audio_mut(&mut self) -> Option<&mut dyn ExpansionAudio> {
        None
    }

    /// Returns `true` when the mapper asserts the CPU IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Clears any IRQ sources latched by the mapper.
    fn clear_irq(&mut self) {}

    /// Optional introspection hook for PRG ROM contents.
    fn prg_rom(&self) -> Option<&[u8]> {
        None
    }

    /// Optional introspection hook for PRG RAM contents.
    fn prg_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Optional mutable access to PRG RAM contents.
    fn prg_ram_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    /// Battery-backed PRG RAM view used by save-file persistence. Defaults
    /// to the same region as [`Mapper::prg_ram`].
    fn prg_save_ram(&self) -> Option<&[u8]> {
        self.prg_ram()
    }

    /// Mutable counterpart of [`Mapper::prg_save_ram`].
    fn prg_save_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.prg_ram_mut()
    }

    /// Optional introspection hook for CHR ROM contents.
    fn chr_rom(&self) -> Option<&[u8]> {
        None
    }

    /// Optional introspection hook for CHR RAM contents.
    fn chr_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Optional mutable access to CHR RAM contents.
    fn chr_ram_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    /// Mapper identifier as used in the iNES header.
    fn mapper_id(&self) -> u16;

    /// Human readable mapper name.
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("Mapper {}", self.mapper_id()))
    }
}

dyn_clone::clone_trait_object!(Mapper);

/// Downcasts a mapper reference to a concrete implementation.
pub fn mapper_downcast_ref<T: Mapper + 'static>(mapper: &dyn Mapper) -> Option<&T> {
    (mapper as &dyn Any).downcast_ref::<T>()
}

/// Downcasts a mutable mapper reference to a concrete implementation.
pub fn mapper_downcast_mut<T: Mapper + 'static>(mapper: &mut dyn Mapper) -> Option<&mut T> {
    (mapper as &mut dyn Any).downcast_mut::<T>()
}

/// Allocate CPU‑visible PRG RAM according to the header hints.
///
/// For NES 2.0 headers this picks the larger of volatile and battery‑backed
/// PRG RAM sizes. Legacy iNES headers with `0` fall back to an empty slice.
pub(crate) fn allocate_prg_ram(header: &Header) -> Box<[u8]> {
    let size = header.prg_ram_size().max(header.prg_nvram_size());
    if size == 0 {
        Vec::new().into_boxed_slice()
    } else {
        vec![0; size].into_boxed_slice()
    }
}

/// Returns the region of PRG RAM where the optional trainer should be copied.
///
/// When the PRG RAM region is too small to host the trainer, `None` is
/// returned and the trainer contents are silently ignored.
pub(crate) fn trainer_destination(prg_ram: &mut [u8]) -> Option<&mut [u8]> {
    if prg_ram.len() < TRAINER_RAM_OFFSET + TRAINER_SIZE {
        return None;
    }
    Some(&mut prg_ram[TRAINER_RAM_OFFSET..TRAINER_RAM_OFFSET + TRAINER_SIZE])
}

/// Allocates PRG RAM per [`allocate_prg_ram`] and copies the optional
/// trainer into its conventional `$7000-$71FF` location.
pub(crate) fn allocate_prg_ram_with_trainer(header: &Header, trainer: TrainerBytes) -> Box<[u8]> {
    let mut prg_ram = allocate_prg_ram(header);
    if let Some(trainer) = trainer
        && let Some(dest) = trainer_destination(&mut prg_ram)
    {
        dest.copy_from_slice(trainer.as_slice());
    }
    prg_ram
}
