use super::sprite::SpriteAttributes;
use crate::mem_block::MemBlock;

const MAX_SPRITES_PER_SCANLINE: usize = 8;

/// A single sprite shifter slot loaded for the current scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct SpriteShifter {
    /// Pattern bitplane 0 (shifted left once per dot after the delay expires).
    plane0: u8,
    /// Pattern bitplane 1 (shifted left once per dot after the delay expires).
    plane1: u8,
    /// Latched attributes (palette select, priority, flips).
    attributes: SpriteAttributes,
    /// Dots remaining before this slot's pixel becomes visible.
    delay: u8,
    /// Marks the slot loaded from OAM sprite 0, for sprite-zero-hit tracking.
    is_sprite0: bool,
}

/// Sprite pixel information produced by the pipeline for a single dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub(crate) struct SpritePixel {
    /// Sprite palette select (0..=3).
    pub(crate) palette: u8,
    /// Sprite color index within the palette (0..=3, 0 means transparent).
    pub(crate) color: u8,
    /// Whether the sprite has background priority (is drawn behind).
    pub(crate) priority_behind_bg: bool,
    /// Whether this pixel came from sprite 0.
    pub(crate) is_sprite0: bool,
}

/// Shifter bank backing one scanline's worth of sprite rendering.
///
/// The NES PPU evaluates up to eight sprites per scanline into eight
/// shifter slots. Each slot's delay counter gates when its pattern bits
/// start contributing to output; once it reaches zero the slot shifts one
/// bit per dot for the rest of the scanline.
type ShifterBank = MemBlock<SpriteShifter, MAX_SPRITES_PER_SCANLINE>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SpritePipeline {
    shifters: ShifterBank,
    loaded_count: u8,
}

impl Default for SpritePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SpritePipeline {
    /// Creates a new pipeline with no loaded sprites.
    pub(crate) fn new() -> Self {
        Self {
            shifters: ShifterBank::new(),
            loaded_count: 0,
        }
    }

    /// Clears all loaded sprite shifters.
    pub(crate) fn clear(&mut self) {
        self.shifters.fill(SpriteShifter::default());
        self.loaded_count = 0;
    }

    /// Loads sprite data for the next scanline from the evaluation/fetch stage.
    ///
    /// `count` is the number of sprites found for the scanline (0..=8);
    /// `sprite0_in_range` indicates whether OAM sprite 0 was one of them.
    /// Pattern bytes are pre-flipped when horizontal flip is set, so shifting
    /// left always walks pixels left-to-right on output.
    pub(crate) fn load_scanline(
        &mut self,
        count: u8,
        sprite0_in_range: bool,
        attrs: &[u8],
        x_positions: &[u8],
        pattern_plane0: &[u8],
        pattern_plane1: &[u8],
    ) {
        self.clear();
        self.loaded_count = count.min(MAX_SPRITES_PER_SCANLINE as u8);

        for i in 0..self.loaded_count as usize {
            let attributes = SpriteAttributes::from_bits_retain(attrs[i]);
            let flip = attributes.contains(SpriteAttributes::FLIP_HORIZONTAL);

            self.shifters[i] = SpriteShifter {
                plane0: if flip {
                    pattern_plane0[i].reverse_bits()
                } else {
                    pattern_plane0[i]
                },
                plane1: if flip {
                    pattern_plane1[i].reverse_bits()
                } else {
                    pattern_plane1[i]
                },
                attributes,
                delay: x_positions[i],
                is_sprite0: sprite0_in_range && i == 0,
            };
        }
    }

    /// Samples the current sprite pixel (first matching non-transparent
    /// shifter wins, lowest OAM index first) and advances every loaded
    /// shifter by one dot.
    pub(crate) fn sample_and_shift(&mut self) -> SpritePixel {
        let mut winner: Option<SpritePixel> = None;

        for shifter in self.shifters.iter_mut().take(self.loaded_count as usize) {
            // Hardware order: the delay counts down first; the shifter only
            // starts contributing pixels on the dot after it reaches zero.
            if shifter.delay > 0 {
                shifter.delay -= 1;
                continue;
            }

            let color = ((shifter.plane1 >> 7) & 1) << 1 | ((shifter.plane0 >> 7) & 1);
            if winner.is_none() && color != 0 {
                winner = Some(SpritePixel {
                    palette: shifter.attributes.bits() & 0b11,
                    color,
                    priority_behind_bg: shifter
                        .attributes
                        .contains(SpriteAttributes::PRIORITY_BEHIND_BACKGROUND),
                    is_sprite0: shifter.is_sprite0,
                });
            }

            shifter.plane0 <<= 1;
            shifter.plane1 <<= 1;
        }

        winner.unwrap_or_default()
    }

    pub(crate) fn save_state(&self) -> crate::ppu::savestate::SpritePipelineState {
        let mut slots = [crate::ppu::savestate::SpriteSlotState::default(); MAX_SPRITES_PER_SCANLINE];
        for (idx, shifter) in self.shifters.iter().enumerate() {
            slots[idx] = crate::ppu::savestate::SpriteSlotState {
                pattern_low: shifter.plane0,
                pattern_high: shifter.plane1,
                attributes: shifter.attributes.bits(),
                x_counter: shifter.delay,
                sprite0: shifter.is_sprite0,
            };
        }
        crate::ppu::savestate::SpritePipelineState {
            active_count: self.loaded_count,
            slots,
        }
    }

    pub(crate) fn load_state(&mut self, state: crate::ppu::savestate::SpritePipelineState) {
        self.loaded_count = state.active_count.min(MAX_SPRITES_PER_SCANLINE as u8);
        for (idx, slot_state) in state.slots.iter().enumerate() {
            self.shifters[idx] = SpriteShifter {
                plane0: slot_state.pattern_low,
                plane1: slot_state.pattern_high,
                attributes: SpriteAttributes::from_bits_retain(slot_state.attributes),
                delay: slot_state.x_counter,
                is_sprite0: slot_state.sprite0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(palette: u8, behind_bg: bool, flip_h: bool) -> u8 {
        let mut bits = palette & 0b11;
        if behind_bg {
            bits |= 0b0010_0000;
        }
        if flip_h {
            bits |= 0b0100_0000;
        }
        bits
    }

    #[test]
    fn delay_gates_output_until_it_reaches_zero() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(1, false, &[attrs(0, false, false)], &[2], &[0xFF], &[0x00]);

        assert_eq!(pipeline.sample_and_shift().color, 0);
        assert_eq!(pipeline.sample_and_shift().color, 0);
        assert_eq!(pipeline.sample_and_shift().color, 1);
    }

    #[test]
    fn horizontal_flip_reverses_pattern_bits_before_shifting() {
        let mut pipeline = SpritePipeline::new();
        // 0b1000_0000 reversed is 0b0000_0001; with delay 0 the first sampled
        // bit is the (reversed) MSB, which is 0, not 1.
        pipeline.load_scanline(1, false, &[attrs(0, false, true)], &[0], &[0b1000_0000], &[0]);
        assert_eq!(pipeline.sample_and_shift().color, 0);
    }

    #[test]
    fn first_loaded_slot_wins_over_later_opaque_ones() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(
            2,
            true,
            &[attrs(1, false, false), attrs(2, false, false)],
            &[0, 0],
            &[0x80, 0x80],
            &[0x00, 0x00],
        );
        let pixel = pipeline.sample_and_shift();
        assert_eq!(pixel.palette, 1);
        assert!(pixel.is_sprite0);
    }

    #[test]
    fn save_and_load_state_round_trips() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(1, true, &[attrs(3, true, false)], &[1], &[0xAA], &[0x55]);
        let saved = pipeline.save_state();

        let mut restored = SpritePipeline::new();
        restored.load_state(saved);
        assert_eq!(pipeline, restored);
    }
}
