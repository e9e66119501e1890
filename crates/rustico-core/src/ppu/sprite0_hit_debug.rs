/// Scanline/cycle coordinates of a sprite-0 hit, latched once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sprite0HitPos {
    pub scanline: i16,
    pub cycle: u16,
}

/// The sprite-0 hit position plus the raw OAM bytes of the sprite that
/// triggered it, kept around for test assertions and timing traces rather
/// than anything the PPU itself consults again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sprite0HitDebug {
    pub pos: Sprite0HitPos,
    pub oam: [u8; 4],
}
