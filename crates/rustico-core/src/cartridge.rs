use std::{borrow::Cow, fs, path::Path};

use crate::{
    cartridge::header::{Header, Mirroring, NES_HEADER_LEN},
    error::Error,
    reset_kind::ResetKind,
};

use self::mapper::{
    Mapper0, Mapper1, Mapper2, Mapper3, Mapper4, Mapper5, Mapper6, Mapper7, Mapper8, Mapper9,
    Mapper10, Mapper11, Mapper13, Mapper19, Mapper21, Mapper23, Mapper25, Mapper26, Mapper34,
    Mapper66, Mapper71, Mapper78, Mapper85, Mapper90, Mapper119, Mapper228,
};

pub const TRAINER_SIZE: usize = 512;

/// Borrowed view of the optional 512-byte trainer section.
///
/// The trainer is always exactly [`TRAINER_SIZE`] bytes when present, and
/// is only needed during mapper construction to initialize any RAM that
/// should be preloaded with trainer data. By borrowing from the original
/// ROM image instead of allocating a boxed array, we avoid an extra copy.
pub type TrainerBytes<'a> = Option<&'a [u8; TRAINER_SIZE]>;

/// Backing type for PRG ROM data.
///
/// - On desktop/host platforms, this is typically `Cow::Owned(Vec<u8>)`.
/// - On embedded targets (e.g. ESP32), this can borrow from a static
///   `include_bytes!` blob via `Cow::Borrowed(&'static [u8])` so that
///   loading a cartridge does not require heap allocation for PRG ROM.
pub type PrgRom = Cow<'static, [u8]>;

/// Backing type for CHR ROM data (PPU pattern tables).
///
/// Follows the same ownership model as [`PrgRom`], allowing CHR data to be
/// borrowed from static blobs on platforms where heap usage is constrained.
pub type ChrRom = Cow<'static, [u8]>;

/// Source image used to construct a [`Cartridge`].
///
/// This allows a single loading API to support both heap-owned ROM
/// bytes (e.g. loaded from disk or network) and statically embedded
/// ROM blobs (e.g. via `include_bytes!` on embedded targets).
pub enum CartridgeImage {
    /// ROM bytes owned in heap memory.
    Owned(Vec<u8>),
    /// ROM bytes embedded in the binary or other static storage.
    Static(&'static [u8]),
}

impl From<Vec<u8>> for CartridgeImage {
    fn from(v: Vec<u8>) -> Self {
        CartridgeImage::Owned(v)
    }
}

impl<const N: usize> From<&'static [u8; N]> for CartridgeImage {
    fn from(bytes: &'static [u8; N]) -> Self {
        CartridgeImage::Static(&bytes[..])
    }
}

impl<'a> From<&'a [u8]> for CartridgeImage {
    fn from(bytes: &'a [u8]) -> Self {
        // Fall back to owning a copy when given a non-'static slice.
        CartridgeImage::Owned(bytes.to_vec())
    }
}

pub mod a12_watcher;
pub mod header;
pub mod mapper;
pub use mapper::{
    CpuBusAccessKind, Mapper, MapperEvent, MapperHookMask, NametableTarget, PpuVramAccessContext,
    PpuVramAccessKind, Provider, mapper_downcast_mut, mapper_downcast_ref,
};

#[derive(Debug)]
pub struct Cartridge {
    header: Header,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    pub fn new(header: Header, mapper: Box<dyn Mapper>) -> Self {
        Self { header, mapper }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn Mapper {
        self.mapper.as_mut()
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.cpu_read(addr)
    }

    pub fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64) {
        self.mapper.cpu_write(addr, data, cpu_cycle);
    }

    pub fn ppu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.ppu_read(addr)
    }

    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        self.mapper.ppu_write(addr, data);
    }

    /// Convenience CHR read (`$0000-$1FFF`) that always returns a byte.
    pub fn chr_read(&self, addr: u16) -> u8 {
        self.mapper.chr_read(addr)
    }

    /// Convenience CHR write (`$0000-$1FFF`) for CHR RAM mappers.
    pub fn chr_write(&mut self, addr: u16, data: u8) {
        self.mapper.chr_write(addr, data);
    }

    /// Notify the mapper about a PPU VRAM access, including CPU bus timing.
    pub fn ppu_vram_access(&mut self, addr: u16, ctx: PpuVramAccessContext) {
        if self
            .mapper
            .hook_mask()
            .contains(MapperHookMask::PPU_BUS_ADDRESS)
        {
            self.mapper
                .on_mapper_event(MapperEvent::PpuBusAddress { addr, ctx });
        }
    }

    /// Allows mappers to post-process the final value returned for a PPU VRAM read.
    pub fn ppu_read_override(&mut self, addr: u16, ctx: PpuVramAccessContext, value: u8) -> u8 {
        if self
            .mapper
            .hook_mask()
            .contains(MapperHookMask::PPU_READ_OVERRIDE)
        {
            self.mapper.ppu_read_override(addr, ctx, value)
        } else {
            value
        }
    }

    /// Advance expansion-audio channels by one CPU bus cycle.
    pub fn clock_expansion_audio(&mut self) {
        if let Some(expansion) = self.mapper.as_expansion_audio_mut() {
            expansion.clock_audio();
        }
    }

    /// Notify mapper of a CPU bus access.
    pub fn cpu_bus_access(
        &mut self,
        kind: CpuBusAccessKind,
        addr: u16,
        value: u8,
        cpu_cycle: u64,
        master_clock: u64,
    ) {
        if self
            .mapper
            .hook_mask()
            .contains(MapperHookMask::CPU_BUS_ACCESS)
        {
            self.mapper.on_mapper_event(MapperEvent::CpuBusAccess {
                kind,
                addr,
                value,
                cpu_cycle,
                master_clock,
            });
        }
    }

    /// Resolve a PPU nametable address to its backing storage.
    pub fn map_nametable(&self, addr: u16) -> NametableTarget {
        self.mapper.map_nametable(addr)
    }

    /// Mapper-controlled nametable read when [`map_nametable`] selects mapper VRAM/ROM.
    pub fn mapper_nametable_read(&self, offset: u16) -> u8 {
        self.mapper.mapper_nametable_read(offset)
    }

    /// Mapper-controlled nametable write when [`map_nametable`] selects mapper VRAM/ROM.
    pub fn mapper_nametable_write(&mut self, offset: u16, value: u8) {
        self.mapper.mapper_nametable_write(offset, value);
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    /// Clears any mapper-asserted IRQ line.
    pub fn clear_irq(&mut self) {
        self.mapper.clear_irq();
    }

    /// Advances mapper-side per-CPU-cycle state (expansion audio, A12 watchers).
    pub fn cpu_clock(&mut self, _cpu_cycle: u64) {
        self.clock_expansion_audio();
    }

    /// Applies a mapper reset using the requested reset kind.
    pub fn reset(&mut self, kind: ResetKind) {
        self.mapper.reset(kind);
    }
}

impl Clone for Cartridge {
    fn clone(&self) -> Self {
        Self {
            header: self.header,
            mapper: dyn_clone::clone_box(self.mapper()),
        }
    }
}

/// Load a cartridge from a ROM image.
///
/// The image can be provided as a heap-owned `Vec<u8>` (e.g. from disk
/// or network) or as a statically embedded blob (e.g. `include_bytes!`).
pub fn load_cartridge(image: impl Into<CartridgeImage>) -> Result<Cartridge, Error> {
    load_cartridge_with_provider(image, None)
}

/// Load a cartridge from a ROM image with an optional mapper provider.
pub fn load_cartridge_with_provider(
    image: impl Into<CartridgeImage>,
    provider: Option<&dyn Provider>,
) -> Result<Cartridge, Error> {
    match image.into() {
        CartridgeImage::Owned(bytes) => load_cartridge_from_bytes(&bytes, provider),
        CartridgeImage::Static(bytes) => load_cartridge_from_static_bytes(bytes, provider),
    }
}

fn build_cartridge_from_sections<'a>(
    header: Header,
    trainer: TrainerBytes<'a>,
    prg_rom: PrgRom,
    chr_rom: ChrRom,
    provider: Option<&dyn Provider>,
) -> Result<Cartridge, Error> {
    // 1) Give the external provider first chance when it explicitly
    //    declares support for this mapper ID.
    if let Some(provider) = provider
        && provider.supports_mapper(header.mapper())
    {
        let mut mapper = provider
            .get_mapper(header, prg_rom, chr_rom, trainer)
            .ok_or(Error::UnsupportedMapper(header.mapper()))?;
        mapper.reset(ResetKind::PowerOn);
        return Ok(Cartridge::new(header, mapper));
    }

    // 2) Fall back to the built-in mapper registry for known IDs.
    let mut mapper: Box<dyn Mapper> = match header.mapper() {
        0 => Box::new(Mapper0::new(header, prg_rom, chr_rom, trainer)),
        1 => Box::new(Mapper1::new(header, prg_rom, chr_rom, trainer)),
        2 => Box::new(Mapper2::new(header, prg_rom, chr_rom, trainer)),
        3 => Box::new(Mapper3::new(header, prg_rom, chr_rom, trainer)),
        4 => Box::new(Mapper4::new(header, prg_rom, chr_rom, trainer)),
        5 => Box::new(Mapper5::new(header, prg_rom, chr_rom, trainer)),
        6 => Box::new(Mapper6::new(header, prg_rom, chr_rom, trainer)),
        7 => Box::new(Mapper7::new(header, prg_rom, chr_rom, trainer)),
        8 => Box::new(Mapper8::new(header, prg_rom, chr_rom, trainer)),
        9 => Box::new(Mapper9::with_trainer(header, prg_rom, chr_rom, trainer)),
        10 => Box::new(Mapper10::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        11 => Box::new(Mapper11::new(header, prg_rom, chr_rom, trainer)),
        13 => Box::new(Mapper13::new(header, prg_rom, chr_rom, trainer)),
        19 => Box::new(Mapper19::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        21 => Box::new(Mapper21::new(header, prg_rom, chr_rom, trainer)),
        23 => Box::new(Mapper23::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        25 => Box::new(Mapper25::with_trainer(header, prg_rom, chr_rom, trainer)),
        26 => Box::new(Mapper26::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        34 => Box::new(Mapper34::new(header, prg_rom, chr_rom, trainer)),
        66 => Box::new(Mapper66::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        71 => Box::new(Mapper71::with_trainer(header, prg_rom, chr_rom, trainer)),
        78 => Box::new(Mapper78::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        85 => Box::new(Mapper85::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        90 => Box::new(Mapper90::with_trainer(header, prg_rom, chr_rom, trainer)),
        119 => Box::new(Mapper119::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        228 => Box::new(Mapper228::with_trainer(
            header,
            prg_rom.into(),
            chr_rom.into(),
            trainer.map(|t| Box::new(*t)),
        )),
        // 3) Unknown to the core: let the provider try to supply a mapper
        //    implementation as a final fallback.
        other => provider
            .and_then(|provider| provider.get_mapper(header, prg_rom, chr_rom, trainer))
            .ok_or(Error::UnsupportedMapper(other))?,
    };

    // Apply mapper-specific power-on defaults once after construction.
    mapper.reset(ResetKind::PowerOn);
    Ok(Cartridge::new(header, mapper))
}

fn load_cartridge_from_bytes(
    bytes: &[u8],
    provider: Option<&dyn Provider>,
) -> Result<Cartridge, Error> {
    let header_bytes = bytes.get(..NES_HEADER_LEN).ok_or(Error::TooShort {
        actual: bytes.len(),
    })?;
    let header = Header::parse(header_bytes)?;
    let (trainer, prg_rom, chr_rom) = slice_sections(bytes, &header)?;

    build_cartridge_from_sections(header, trainer, prg_rom, chr_rom, provider)
}

fn load_cartridge_from_static_bytes(
    bytes: &'static [u8],
    provider: Option<&dyn Provider>,
) -> Result<Cartridge, Error> {
    let header_bytes = bytes.get(..NES_HEADER_LEN).ok_or(Error::TooShort {
        actual: bytes.len(),
    })?;
    let header = Header::parse(header_bytes)?;
    let (trainer, prg_rom, chr_rom) = slice_sections_static(bytes, &header)?;

    build_cartridge_from_sections(header, trainer, prg_rom, chr_rom, provider)
}

/// Load a cartridge directly from disk.
pub fn load_cartridge_from_file<P>(path: P) -> Result<Cartridge, Error>
where
    P: AsRef<Path>,
{
    load_cartridge_from_file_with_provider(path, None)
}

/// Load a cartridge directly from disk with an optional mapper provider.
pub fn load_cartridge_from_file_with_provider<P>(
    path: P,
    provider: Option<&dyn Provider>,
) -> Result<Cartridge, Error>
where
    P: AsRef<Path>,
{
    let bytes = fs::read(path)?;
    load_cartridge_with_provider(bytes, provider)
}

fn slice_trainer<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    header: &Header,
) -> Result<TrainerBytes<'a>, Error> {
    if !header.trainer_present() {
        return Ok(None);
    }

    let end = cursor
        .checked_add(TRAINER_SIZE)
        .ok_or(Error::SectionTooShort {
            section: "trainer",
            expected: TRAINER_SIZE,
            actual: bytes.len().saturating_sub(*cursor),
        })?;
    let slice = bytes.get(*cursor..end).ok_or(Error::SectionTooShort {
        section: "trainer",
        expected: TRAINER_SIZE,
        actual: bytes.len().saturating_sub(*cursor),
    })?;
    *cursor = end;
    let array_ref: &[u8; TRAINER_SIZE] = slice.try_into().expect("trainer length mismatch");
    Ok(Some(array_ref))
}

fn slice_section<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    name: &'static str,
) -> Result<&'a [u8], Error> {
    if len == 0 {
        return Ok(&bytes[0..0]);
    }

    let end = cursor.checked_add(len).ok_or(Error::SectionTooShort {
        section: name,
        expected: len,
        actual: bytes.len().saturating_sub(*cursor),
    })?;

    let slice = bytes.get(*cursor..end).ok_or(Error::SectionTooShort {
        section: name,
        expected: len,
        actual: bytes.len().saturating_sub(*cursor),
    })?;

    *cursor = end;
    Ok(slice)
}

fn slice_sections_static(
    bytes: &'static [u8],
    header: &Header,
) -> Result<(TrainerBytes<'static>, PrgRom, ChrRom), Error> {
    let mut cursor = NES_HEADER_LEN;
    let trainer = slice_trainer(bytes, &mut cursor, header)?;

    let prg_slice = slice_section(bytes, &mut cursor, header.prg_rom_size(), "PRG ROM")?;
    let chr_slice = slice_section(bytes, &mut cursor, header.chr_rom_size(), "CHR ROM")?;

    Ok((
        trainer,
        PrgRom::Borrowed(prg_slice),
        ChrRom::Borrowed(chr_slice),
    ))
}

fn slice_sections<'a>(
    bytes: &'a [u8],
    header: &Header,
) -> Result<(TrainerBytes<'a>, PrgRom, ChrRom), Error> {
    let mut cursor = NES_HEADER_LEN;
    let trainer = slice_trainer(bytes, &mut cursor, header)?;

    let prg_rom = slice_section(bytes, &mut cursor, header.prg_rom_size(), "PRG ROM")?;
    let chr_rom = slice_section(bytes, &mut cursor, header.chr_rom_size(), "CHR ROM")?;

    Ok((
        trainer,
        PrgRom::Owned(prg_rom.to_vec()),
        ChrRom::Owned(chr_rom.to_vec()),
    ))
}
