//! Fixed lookup tables shared by the APU channels.

/// Length counter load values indexed by the 5-bit field written to
/// `$4003`/`$4007`/`$400B`/`$400F` bits 3-7.
pub(super) const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Duty-cycle waveforms for the two pulse channels, one row per duty setting.
pub(super) const PULSE_DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

/// Triangle channel's 32-step output sequence (ramps 15..0 then 0..15).
pub(super) const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Noise channel timer periods (NTSC), indexed by the 4-bit rate field.
pub(super) const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// DMC timer periods (NTSC), indexed by the 4-bit rate field.
pub(super) const DMC_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// Base CPU address DMC sample addresses are computed from (`$C000`).
pub(super) const DMC_SAMPLE_BASE: u16 = 0xC000;
/// `sample_address = DMC_SAMPLE_BASE + value * DMC_SAMPLE_ADDR_STRIDE`.
pub(super) const DMC_SAMPLE_ADDR_STRIDE: u16 = 64;
/// `sample_length = value * DMC_SAMPLE_LEN_STRIDE + 1`.
pub(super) const DMC_SAMPLE_LEN_STRIDE: u16 = 16;
