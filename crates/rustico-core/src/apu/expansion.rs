use core::fmt::Debug;

/// Per-board expansion audio output, one field per board family this core
/// supports. A board only ever populates its own field(s); everything else
/// stays at the `Default` value of `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExpansionSamples {
    pub vrc6: f32,
    pub vrc7: f32,
    pub mmc5: f32,
    pub namco163: f32,
    pub sunsoft5b: f32,
    pub fds: f32,
}

impl ExpansionSamples {
    /// Sums every channel, for boards/mixers that don't care which
    /// generator produced the signal.
    pub fn total(&self) -> f32 {
        self.vrc6 + self.vrc7 + self.mmc5 + self.namco163 + self.sunsoft5b + self.fds
    }
}

/// Optional expansion audio interface implemented by certain cartridge boards.
///
/// Boards such as VRC6/VRC7, Sunsoft 5B, MMC5, Namco 163, or FDS provide extra
/// sound generators that are mixed alongside the core APU channels.
///
/// By default these methods are no-ops / silent so that mappers can opt-in to
/// expansion audio simply by providing an empty `impl ExpansionAudio` block.
///
/// Expansion audio is clocked once per CPU bus cycle via
/// `Cartridge::clock_expansion_audio`, matching how the core APU channels are
/// clocked from the same timing domain.
pub trait ExpansionAudio: Debug + Send {
    /// Advance the expansion audio state by one CPU cycle.
    fn clock_audio(&mut self) {}

    /// Current expansion audio samples in linear amplitude space.
    ///
    /// Each channel is expected to be in a reasonable range (e.g.
    /// `0.0..=1.0`); the mixer may apply additional scaling when combining
    /// it with the core APU output.
    fn samples(&self) -> ExpansionSamples {
        ExpansionSamples::default()
    }
}
