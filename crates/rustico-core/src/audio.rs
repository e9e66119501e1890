//! Audio pipeline: per-channel synthesis ([`mixer`]) feeding a host-facing
//! resampling/volume stage ([`bus`]).

pub mod bus;
pub mod channel;
pub mod filters;
pub mod mixer;
pub mod settings;

pub use channel::AudioChannel;
pub use filters::StereoFilterType;
pub use mixer::NesSoundMixer;
pub use settings::MixerSettings;
pub use bus::SoundMixerBus;

/// NTSC CPU/APU clock rate in Hz.
pub const CPU_CLOCK_NTSC: f64 = 1_789_773.0;
