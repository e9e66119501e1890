use crate::{
    apu::Apu,
    audio::{NesSoundMixer, SoundMixerBus},
    bus::{CpuBus, DmcDmaEvent, OpenBus, PendingDma},
    cartridge::{Cartridge, Provider, load_cartridge, load_cartridge_with_provider},
    controller::{Button, ControllerPorts, Port, SerialLogger},
    cpu::Cpu,
    error::Error,
    mem_block::cpu as cpu_ram,
    memory::cpu as cpu_mem,
    ppu::{
        Ppu,
        buffer::{ColorFormat, FrameBuffer},
        palette::Palette,
    },
    reset_kind::ResetKind,
};

/// Borrows the fields a [`CpuBus`] needs out of `$nes` (an `&mut Nes` or
/// `self` inside an `&mut self` method), leaving `$nes.cpu` untouched so the
/// caller can still drive the CPU with the resulting bus. A plain `&mut self`
/// method can't do this split: its return value would borrow all of `self`,
/// not just the fields the bus actually needs.
macro_rules! cpu_bus {
    ($nes:expr) => {
        CpuBus::new(
            &mut $nes.ram,
            &mut $nes.ppu,
            &mut $nes.apu,
            $nes.cartridge.as_mut(),
            $nes.controllers.as_array(),
            $nes.serial_log.as_mut(),
            &mut $nes.oam_dma_request,
            &mut $nes.open_bus,
            Some(&mut $nes.mixer),
            &mut $nes.cycles,
            &mut $nes.master_clock,
            $nes.ppu_offset,
            $nes.clock_start_count,
            $nes.clock_end_count,
        )
    };
}

/// Owns every piece of console hardware and drives it with the same
/// begin/end-cycle scheduler [`CpuBus`] already applies to a single bus
/// access, one CPU instruction at a time.
///
/// There is deliberately no separate bus type that owns the hardware: a
/// fresh [`CpuBus`] borrows these fields for the span of a single
/// [`Cpu::step`] call (mirroring the pattern in `bus::cpu`'s own tests), so
/// the hardware itself, not a wrapper around it, is the single source of
/// truth for save states and debugging.
#[derive(Debug)]
pub struct Nes {
    pub(crate) cpu: Cpu,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) ram: cpu_ram::Ram,
    pub(crate) cartridge: Option<Cartridge>,
    pub(crate) controllers: ControllerPorts,
    serial_log: Option<SerialLogger>,
    mapper_provider: Option<Box<dyn Provider>>,

    pub(crate) last_frame: u32,
    pub(crate) dot_counter: u64,
    pub(crate) master_clock: u64,
    pub(crate) ppu_offset: u8,
    pub(crate) clock_start_count: u8,
    pub(crate) clock_end_count: u8,
    pub(crate) pending_dma: PendingDma,
    pub(crate) open_bus: OpenBus,
    pub(crate) cycles: u64,
    oam_dma_request: Option<u8>,

    pub(crate) mixer: NesSoundMixer,
    pub(crate) sound_bus: SoundMixerBus,
    pub(crate) mixer_frame_buffer: Vec<f32>,
}

impl Nes {
    pub(crate) const FORMAT_VERSION: u32 = 1;

    pub fn new(color_format: ColorFormat) -> Self {
        let clock_rate = crate::audio::CPU_CLOCK_NTSC;
        let sample_rate = 48_000;
        Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(FrameBuffer::new(color_format)),
            apu: Apu::new(),
            ram: cpu_ram::Ram::new(),
            cartridge: None,
            controllers: ControllerPorts::new(),
            serial_log: None,
            mapper_provider: None,
            last_frame: 0,
            dot_counter: 0,
            master_clock: 0,
            ppu_offset: 1,
            clock_start_count: 6,
            clock_end_count: 6,
            pending_dma: PendingDma::default(),
            open_bus: OpenBus::new(),
            cycles: 0,
            oam_dma_request: None,
            mixer: NesSoundMixer::new(clock_rate, sample_rate),
            sound_bus: SoundMixerBus::new(sample_rate, sample_rate),
            mixer_frame_buffer: Vec::new(),
        }
    }

    /// Replaces the master system palette used to convert PPU palette
    /// indices to the framebuffer's output color format.
    pub fn set_palette(&mut self, palette: Palette) {
        self.ppu.set_palette(palette);
    }

    /// Registers a fallback mapper [`Provider`] consulted by [`Nes::load_rom`]
    /// for mapper IDs the core doesn't implement itself.
    pub fn set_mapper_provider(&mut self, provider: Option<Box<dyn Provider>>) {
        self.mapper_provider = provider;
    }

    /// Attaches a [`SerialLogger`] that records every bit written to the
    /// shared `$4016`/`$4017` strobe line.
    pub fn set_serial_logger(&mut self, logger: Option<SerialLogger>) {
        self.serial_log = logger;
    }

    /// Parses `image` as an iNES/NES 2.0 ROM and inserts it, consulting the
    /// registered mapper provider (if any) for unsupported mapper IDs.
    pub fn load_rom(&mut self, image: Vec<u8>) -> Result<(), Error> {
        let cart = match &self.mapper_provider {
            Some(provider) => load_cartridge_with_provider(image, Some(provider.as_ref()))?,
            None => load_cartridge(image)?,
        };
        self.insert_cartridge(cart);
        Ok(())
    }

    /// Inserts an already-built cartridge, replacing any previously loaded one.
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
        self.reset(ResetKind::PowerOn);
    }

    /// Removes the currently inserted cartridge, if any.
    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    pub fn has_cartridge(&self) -> bool {
        self.cartridge.is_some()
    }

    /// Updates one button on one controller port.
    pub fn set_button(&mut self, port: u8, button: Button, pressed: bool) {
        let port = if port == 0 { Port::Port1 } else { Port::Port2 };
        self.controllers.set_button(port, button, pressed);
    }

    /// Power-on or soft-resets the CPU, re-sampling the NMI line and
    /// re-reading the reset vector from the currently inserted cartridge.
    pub fn reset(&mut self, kind: ResetKind) {
        {
            let mut bus = cpu_bus!(self);
            self.cpu.reset(&mut bus, kind);
        }
        self.ppu.reset(kind);
        self.apu.reset();
    }

    /// Exposes the active framebuffer for presentation by a host frontend.
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.ppu.framebuffer
    }

    /// Runs CPU instructions until the PPU completes one full frame,
    /// servicing OAM/DMC DMA requests the bus surfaces along the way.
    ///
    /// `fast_forward` is accepted for API parity with frontends that skip
    /// audio mixing while seeking; the core itself does not change timing
    /// behavior based on it.
    pub fn run_frame(&mut self, fast_forward: bool) {
        let _ = fast_forward;
        let target_frame = self.last_frame.wrapping_add(1);
        loop {
            {
                let mut bus = cpu_bus!(self);
                self.cpu.step(&mut bus);
                self.pending_dma.dmc = bus
                    .take_pending_dmc_stall()
                    .and_then(|(_, addr)| addr.map(|addr| DmcDmaEvent::Request { addr }));
                self.pending_dma.oam_page = bus.take_oam_dma_request();
            }

            self.service_pending_dma();

            if self.ppu.frame == target_frame {
                self.last_frame = target_frame;
                break;
            }
        }
    }

    /// Drains whatever DMA the last CPU step queued up. OAM DMA is modeled
    /// as 256 real bus reads/writes through `$2004` so the PPU, mapper, and
    /// open-bus all see it exactly like a CPU-driven copy; DMC DMA just
    /// fetches the sample byte the APU asked for.
    fn service_pending_dma(&mut self) {
        if let Some(page) = self.pending_dma.oam_page.take() {
            let base = (page as u16) << 8;
            let mut bus = cpu_bus!(self);
            for offset in 0..256u16 {
                let byte = bus.read(base + offset);
                bus.write(cpu_mem::PPU_REGISTER_BASE | 0x0004, byte);
            }
        }
        if let Some(DmcDmaEvent::Request { addr }) = self.pending_dma.dmc.take() {
            let byte = cpu_bus!(self).dmc_read(addr);
            self.apu.complete_dmc_fetch(byte);
        }
    }

    /// Mixes whatever audio the APU produced this frame through the
    /// host-rate post-processing stage and returns interleaved stereo
    /// samples at [`SoundMixerBus::output_rate`].
    pub fn end_audio_frame(&mut self) -> &[f32] {
        let mut native = Vec::new();
        self.mixer.end_frame(self.cycles as i64, &mut native);

        self.mixer_frame_buffer.clear();
        self.sound_bus
            .mix_frame(&[&native], &mut self.mixer_frame_buffer);
        &self.mixer_frame_buffer
    }
}

impl Default for Nes {
    fn default() -> Self {
        Self::new(ColorFormat::Rgb888)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_nrom_rom() -> Vec<u8> {
        let mut rom = Vec::with_capacity(16 + 16 * 1024 + 8 * 1024);
        rom.extend_from_slice(b"NES\x1A");
        rom.push(1);
        rom.push(1);
        rom.push(0);
        rom.push(0);
        rom.extend_from_slice(&[0; 8]);
        rom.extend_from_slice(&vec![0u8; 16 * 1024]);
        rom.extend_from_slice(&vec![0u8; 8 * 1024]);
        rom
    }

    #[test]
    fn runs_frames_without_a_real_game() {
        let mut nes = Nes::new(ColorFormat::Rgb555);
        nes.load_rom(dummy_nrom_rom()).expect("load dummy rom");
        nes.set_button(0, Button::A, true);
        nes.run_frame(false);
        assert_eq!(nes.last_frame, 1);
        nes.run_frame(false);
        assert_eq!(nes.last_frame, 2);
    }

    #[test]
    fn oam_dma_copies_256_bytes_through_the_bus() {
        let mut nes = Nes::new(ColorFormat::Rgb555);
        nes.load_rom(dummy_nrom_rom()).expect("load dummy rom");

        {
            let mut bus = cpu_bus!(nes);
            for offset in 0..256u16 {
                bus.write(cpu_mem::INTERNAL_RAM_START + offset, offset as u8);
            }
        }
        nes.pending_dma.oam_page = Some(0x00);
        nes.service_pending_dma();
        assert_eq!(nes.ppu.registers.oam.as_slice()[0x10], 0x10);
    }
}
