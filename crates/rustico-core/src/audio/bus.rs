//! Host-facing audio bus: accepts interleaved stereo PCM at the console's
//! native audio rate from one or more [`NesSoundMixer`] instances and
//! resamples it to whatever rate the playback device actually wants.
//!
//! The DAC inside each console produces audio on its own clock (NTSC and PAL
//! consoles don't even agree with each other), so a frontend asking for
//! 44.1 kHz or 48 kHz output needs a resampling stage regardless of which
//! region ROM is loaded. This bus also hosts the handful of host-side
//! conveniences a frontend expects: master volume, background/fast-forward
//! attenuation, and light EQ/reverb/crossfeed shaping.

/// Host-facing volume and signal-shaping configuration.
///
/// All fields are in host-facing units:
/// - `master_volume` in `[0.0, 1.0]` (0 = muted, 1 = full scale).
/// - `volume_reduction` in `[0.0, 1.0]` (0.75 ≈ "reduce by 75%").
/// - `mute_in_background` / `reduce_in_background` control attenuation when
///   `in_background` is true.
/// - `reduce_in_fast_forward` controls attenuation when `is_fast_forward`
///   is true.
#[derive(Debug, Clone, Copy)]
pub struct AudioBusConfig {
    pub master_volume: f32,
    pub mute_in_background: bool,
    pub reduce_in_background: bool,
    pub reduce_in_fast_forward: bool,
    pub volume_reduction: f32,
    pub in_background: bool,
    pub is_fast_forward: bool,
    pub enable_equalizer: bool,
    pub eq_band_gains: [f32; EQ_BAND_COUNT],
    pub reverb_enabled: bool,
    /// Reverb strength in `[0.0, 1.0]` (0 = off, 1 = strong).
    pub reverb_strength: f32,
    pub reverb_delay_ms: f32,
    pub crossfeed_enabled: bool,
    /// Crossfeed ratio in `[0.0, 1.0]` (0 = none, 1 = strong).
    pub crossfeed_ratio: f32,
}

/// Number of EQ bands exposed to the host; loosely modeled after a typical
/// graphic equalizer, not tied to any console hardware.
pub const EQ_BAND_COUNT: usize = 20;

impl Default for AudioBusConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            mute_in_background: false,
            reduce_in_background: true,
            reduce_in_fast_forward: false,
            volume_reduction: 0.75,
            in_background: false,
            is_fast_forward: false,
            enable_equalizer: false,
            eq_band_gains: [0.0; EQ_BAND_COUNT],
            reverb_enabled: false,
            reverb_strength: 0.0,
            reverb_delay_ms: 0.0,
            crossfeed_enabled: false,
            crossfeed_ratio: 0.0,
        }
    }
}

/// A post-processing stage applied, in order, to resampled host-rate PCM.
///
/// Kept as a trait instead of three hardcoded fields so the bus's `apply_all`
/// loop doesn't need to know the concrete stage count or ordering logic
/// beyond "run whichever ones are enabled, in pipeline order".
trait PostStage: std::fmt::Debug {
    fn enabled(&self, config: &AudioBusConfig) -> bool;
    fn run(&mut self, samples: &mut [f32], output_rate: u32, config: &AudioBusConfig);
    fn reset(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Equalizer {
    bands_db: [f32; EQ_BAND_COUNT],
    sample_rate: u32,
}

impl Equalizer {
    fn update(&mut self, bands_db: &[f32; EQ_BAND_COUNT], sample_rate: u32) {
        self.bands_db = *bands_db;
        self.sample_rate = sample_rate;
    }
}

impl PostStage for Equalizer {
    fn enabled(&self, config: &AudioBusConfig) -> bool {
        config.enable_equalizer
    }

    fn run(&mut self, samples: &mut [f32], output_rate: u32, config: &AudioBusConfig) {
        self.update(&config.eq_band_gains, output_rate);

        // Neutral when all gains are near 0 dB.
        if self.bands_db.iter().all(|g| g.abs() < 0.001) {
            return;
        }

        // A full multi-band filter bank is overkill for the NES's bandwidth;
        // approximate it with a single gain derived from the average
        // requested band.
        let sum: f32 = self.bands_db.iter().copied().sum();
        let avg_db = sum / self.bands_db.len() as f32;
        let gain = 10.0_f32.powf(avg_db / 20.0);
        if (gain - 1.0).abs() < 0.001 {
            return;
        }

        for s in samples {
            *s *= gain;
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ReverbFilter {
    left: Vec<f32>,
    right: Vec<f32>,
    index: usize,
    delay_samples: usize,
    decay: f32,
}

impl ReverbFilter {
    fn configure(&mut self, sample_rate: u32, strength: f32, delay_ms: f32) {
        if sample_rate == 0 {
            self.reset();
            return;
        }

        let delay_samples = ((delay_ms / 1000.0) * sample_rate as f32).round().max(1.0) as usize;
        let decay = strength.clamp(0.0, 1.0);

        if delay_samples != self.delay_samples {
            self.left.clear();
            self.right.clear();
            self.left.resize(delay_samples, 0.0);
            self.right.resize(delay_samples, 0.0);
            self.index = 0;
        }

        self.delay_samples = delay_samples;
        self.decay = decay;
    }
}

impl PostStage for ReverbFilter {
    fn enabled(&self, config: &AudioBusConfig) -> bool {
        config.reverb_enabled
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.index = 0;
        self.delay_samples = 0;
        self.decay = 0.0;
    }

    fn run(&mut self, samples: &mut [f32], output_rate: u32, config: &AudioBusConfig) {
        let (strength, delay_ms) = (config.reverb_strength, config.reverb_delay_ms);
        if strength <= 0.0 || delay_ms <= 0.0 {
            // Keep any existing delay line but don't add new reverb energy
            // while disabled.
            return;
        }

        let frames = samples.len() / 2;
        if frames == 0 {
            return;
        }

        self.configure(output_rate, strength, delay_ms);
        if self.delay_samples == 0 || self.left.is_empty() {
            return;
        }

        let delay_len = self.delay_samples;
        for i in 0..frames {
            let idx = self.index % delay_len;

            let l = samples[2 * i];
            let r = samples[2 * i + 1];

            let dl = self.left[idx];
            let dr = self.right[idx];

            let out_l = l + dl * self.decay;
            let out_r = r + dr * self.decay;

            samples[2 * i] = out_l;
            samples[2 * i + 1] = out_r;

            // Feed the wet signal back into the delay line.
            self.left[idx] = out_l;
            self.right[idx] = out_r;

            self.index = (self.index + 1) % delay_len;
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CrossFeedFilter;

impl PostStage for CrossFeedFilter {
    fn enabled(&self, config: &AudioBusConfig) -> bool {
        config.crossfeed_enabled
    }

    fn run(&mut self, samples: &mut [f32], _output_rate: u32, config: &AudioBusConfig) {
        let ratio = config.crossfeed_ratio.clamp(0.0, 1.0);
        if ratio <= 0.0 {
            return;
        }
        let frames = samples.len() / 2;
        for i in 0..frames {
            let idx = i * 2;
            let l = samples[idx];
            let r = samples[idx + 1];
            samples[idx] = l + r * ratio;
            samples[idx + 1] = r + l * ratio;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoundMixerBus {
    /// Input rate the attached mixer actually renders at.
    base_input_rate: u32,
    /// Effective input rate used by the resampler.
    ///
    /// Normally equal to `base_input_rate`, but a frontend locked to an
    /// integer display refresh rate (60 Hz) rather than the console's true
    /// field rate (~60.0988 Hz on NTSC) can nudge this to time-stretch audio
    /// instead of drifting out of sync with video.
    input_rate: u32,
    output_rate: u32,
    config: AudioBusConfig,
    eq: Equalizer,
    reverb: ReverbFilter,
    crossfeed: CrossFeedFilter,
    /// Scratch buffer used to sum multiple sources before resampling.
    mix_scratch: Vec<f32>,
}

impl SoundMixerBus {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        let input_rate = input_rate.max(1);
        Self {
            base_input_rate: input_rate,
            input_rate,
            output_rate: output_rate.max(1),
            config: AudioBusConfig::default(),
            eq: Equalizer::default(),
            reverb: ReverbFilter::default(),
            crossfeed: CrossFeedFilter,
            mix_scratch: Vec::new(),
        }
    }

    /// Clears internal filter state; the rate configuration is preserved.
    pub fn reset(&mut self) {
        self.mix_scratch.clear();
        self.reverb.reset();
    }

    /// Time-stretch knob: changes how many output samples a fixed-size input
    /// chunk produces without changing the rate the mixer itself renders at.
    pub fn set_resample_input_rate(&mut self, input_rate: u32) {
        self.input_rate = input_rate.max(1);
    }

    pub fn reset_resample_input_rate(&mut self) {
        self.input_rate = self.base_input_rate;
    }

    pub fn set_output_rate(&mut self, output_rate: u32) {
        self.output_rate = output_rate.max(1);
    }

    pub fn set_config(&mut self, config: AudioBusConfig) {
        self.config = config;
    }

    pub fn config(&self) -> AudioBusConfig {
        self.config
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn stages_mut(&mut self) -> [&mut dyn PostStage; 3] {
        [&mut self.eq, &mut self.reverb, &mut self.crossfeed]
    }

    /// Sums one or more interleaved stereo sources, resamples the result to
    /// the configured output rate, and appends it to `out`.
    ///
    /// - All sources must share `input_rate`; a source shorter than the
    ///   longest one contributes silence for its missing tail.
    /// - Samples are summed in linear amplitude before resampling.
    pub fn mix_frame(&mut self, sources: &[&[f32]], out: &mut Vec<f32>) {
        if sources.is_empty() {
            return;
        }

        let min_len = sources.iter().map(|s| s.len()).min().unwrap_or(0);
        let frames_in = min_len / 2;
        if frames_in == 0 {
            return;
        }

        self.mix_scratch.clear();
        self.mix_scratch.resize(frames_in * 2, 0.0);
        for src in sources {
            let frames = (src.len() / 2).min(frames_in);
            for i in 0..frames * 2 {
                self.mix_scratch[i] += src[i];
            }
        }

        let out_start = out.len();
        resample_linear_stereo(&self.mix_scratch, self.input_rate, self.output_rate, out);

        let output_rate = self.output_rate;
        let config = self.config;
        let slice = &mut out[out_start..];
        for stage in self.stages_mut() {
            if stage.enabled(&config) {
                stage.run(slice, output_rate, &config);
            }
        }

        let gain = effective_gain(&config);
        if gain < 1.0 - f32::EPSILON {
            for s in &mut out[out_start..] {
                *s *= gain;
            }
        }
    }
}

fn effective_gain(config: &AudioBusConfig) -> f32 {
    let mut gain = config.master_volume.clamp(0.0, 1.0);

    if config.in_background {
        if config.mute_in_background {
            gain = 0.0;
        } else if config.reduce_in_background {
            gain *= 1.0 - config.volume_reduction.clamp(0.0, 1.0);
        }
    }

    if config.is_fast_forward && config.reduce_in_fast_forward {
        gain *= 1.0 - config.volume_reduction.clamp(0.0, 1.0);
    }

    gain
}

/// Hermite (Catmull-Rom) stereo resampler.
///
/// The NES's effective audio bandwidth is low enough that a cheap
/// per-sample spline keeps artifacts well below audible thresholds while
/// staying fast enough to run inline with emulation.
fn resample_linear_stereo(input: &[f32], input_rate: u32, output_rate: u32, out: &mut Vec<f32>) {
    let frames_in = input.len() / 2;
    if frames_in == 0 || input_rate == 0 || output_rate == 0 {
        return;
    }

    if input_rate == output_rate {
        out.extend_from_slice(input);
        return;
    }

    let frames_in_f = frames_in as f64;
    let ratio = output_rate as f64 / input_rate as f64;
    let frames_out = ((frames_in_f * ratio).round() as usize).max(1);

    out.reserve(frames_out * 2);

    if frames_in == 1 {
        let (l, r) = (input[0], input[1]);
        for _ in 0..frames_out {
            out.push(l);
            out.push(r);
        }
        return;
    }

    let last_in = (frames_in - 1) as f64;
    let last_out = (frames_out - 1).max(1) as f64;

    for i in 0..frames_out {
        let pos = if frames_out == 1 {
            0.0
        } else {
            (i as f64) * last_in / last_out
        };
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;

        let i1 = idx.clamp(0, frames_in - 1);
        let i2 = (idx + 1).clamp(0, frames_in - 1);
        let i0 = i1.saturating_sub(1);
        let i3 = (i2 + 1).clamp(0, frames_in - 1);

        let sample_at = |frame: usize, channel: usize| input[frame * 2 + channel];
        let l = catmull_rom(
            sample_at(i0, 0),
            sample_at(i1, 0),
            sample_at(i2, 0),
            sample_at(i3, 0),
            frac,
        );
        let r = catmull_rom(
            sample_at(i0, 1),
            sample_at(i1, 1),
            sample_at(i2, 1),
            sample_at(i3, 1),
            frac,
        );
        out.push(l);
        out.push(r);
    }
}

fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c = -0.5 * y0 + 0.5 * y2;
    let d = y1;
    a * t3 + b * t2 + c * t + d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_copies_input() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);
        let src = vec![0.1f32, -0.1, 0.2, -0.2, 0.3, -0.3, 0.4, -0.4];
        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);
        assert_eq!(src, out);
    }

    #[test]
    fn resample_down_96k_to_48k_halves_frame_count() {
        let mut bus = SoundMixerBus::new(96_000, 48_000);
        let frames_in = 1600usize;
        let mut src = Vec::with_capacity(frames_in * 2);
        for i in 0..frames_in {
            let v = i as f32 / frames_in as f32;
            src.push(v);
            src.push(-v);
        }

        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);

        let frames_out = out.len() / 2;
        assert_eq!(frames_out, 800, "expected half as many frames at 48 kHz");

        let l_first = out[0];
        let r_first = out[1];
        let l_last = out[out.len() - 2];
        let r_last = out[out.len() - 1];

        assert!(l_first.abs() < 1e-6 && r_first.abs() < 1e-6);
        assert!(l_last > 0.9 && r_last < -0.9);
    }

    #[test]
    fn resample_down_96k_to_44100_matches_expected_frames_per_frame() {
        let mut bus = SoundMixerBus::new(96_000, 44_100);
        let frames_in = 1600usize; // 96k / 60
        let mut src = Vec::with_capacity(frames_in * 2);
        for _ in 0..frames_in {
            src.push(0.0);
            src.push(0.0);
        }

        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);
        let frames_out = out.len() / 2;

        // 44_100 / 60 = 735 frames per NTSC frame.
        assert_eq!(frames_out, 735);
    }

    #[test]
    fn master_volume_scales_output() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);
        let cfg = AudioBusConfig {
            master_volume: 0.5,
            ..Default::default()
        };
        bus.set_config(cfg);

        let src = vec![0.8f32, -0.8, 0.2, -0.2];
        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);

        assert_eq!(out.len(), src.len());
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert!((out[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn background_and_fast_forward_attenuation_match_config() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);

        let mut cfg = AudioBusConfig {
            master_volume: 1.0,
            volume_reduction: 0.75,
            in_background: true,
            mute_in_background: false,
            reduce_in_background: true,
            is_fast_forward: false,
            reduce_in_fast_forward: false,
            ..Default::default()
        };

        bus.set_config(cfg);

        let src = vec![1.0f32, 1.0];
        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.25).abs() < 1e-6);

        out.clear();
        cfg.is_fast_forward = true;
        cfg.reduce_in_fast_forward = true;
        bus.set_config(cfg);
        bus.mix_frame(&[&src], &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0625).abs() < 1e-6);
    }

    #[test]
    fn equalizer_applies_global_gain_when_enabled() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);
        let cfg = AudioBusConfig {
            enable_equalizer: true,
            eq_band_gains: [6.0; EQ_BAND_COUNT],
            ..Default::default()
        };
        bus.set_config(cfg);

        let src = vec![0.5f32, -0.5];
        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);

        // 6 dB ≈ *2.0 global gain.
        assert_eq!(out.len(), 2);
        assert!(out[0] > 0.9 && out[0] < 1.1);
        assert!(out[1] < -0.9 && out[1] > -1.1);
    }

    #[test]
    fn crossfeed_blends_channels_when_enabled() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);
        let cfg = AudioBusConfig {
            crossfeed_enabled: true,
            crossfeed_ratio: 0.5,
            ..Default::default()
        };
        bus.set_config(cfg);

        let src = vec![1.0f32, 0.0];
        let mut out = Vec::new();
        bus.mix_frame(&[&src], &mut out);

        assert_eq!(out.len(), 2);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reverb_adds_delayed_energy_over_time() {
        let mut bus = SoundMixerBus::new(48_000, 48_000);
        let cfg = AudioBusConfig {
            reverb_enabled: true,
            reverb_strength: 0.5,
            reverb_delay_ms: 10.0,
            ..Default::default()
        };
        bus.set_config(cfg);

        let frames = 100usize;
        let mut out = Vec::new();

        let mut src = vec![0.0f32; frames * 2];
        src[0] = 1.0;
        bus.mix_frame(&[&src], &mut out);
        let first_frame = out.clone();
        assert!(first_frame.iter().any(|&v| v > 0.0));

        let silent = vec![0.0f32; frames * 2];
        let mut found_energy = false;
        for _ in 0..10 {
            out.clear();
            bus.mix_frame(&[&silent], &mut out);
            if out.iter().any(|&v| v.abs() > 0.0) {
                found_energy = true;
                break;
            }
        }
        assert!(found_energy);
    }
}
