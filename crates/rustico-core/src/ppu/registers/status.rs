use bitflags::bitflags;

bitflags! {
    /// PPU status register (`$2002`): read-only, and reading it clears
    /// the vertical blank flag and the scroll-write latch as a side effect.
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// V S O . . . . .
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct Status: u8 {
        /// `O`: at least 8 sprites matched on some scanline this frame.
        const SPRITE_OVERFLOW = 0b0010_0000;

        /// `S`: sprite 0's opaque pixel overlapped an opaque background pixel.
        const SPRITE_ZERO_HIT = 0b0100_0000;

        /// `V`: set at the start of vblank, cleared on a `$2002` read.
        const VERTICAL_BLANK = 0b1000_0000;
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::empty()
    }
}
