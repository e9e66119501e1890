use std::convert::Infallible;

use crate::ppu::Ppu;
use crate::state::{SaveState, Snapshot};

/// Minimal `SaveState` implementation for the PPU: clones the whole struct,
/// framebuffer included. [`crate::state::nes::ppu_to_state`] is the
/// framebuffer-free snapshot used by full `Nes` save states.
impl SaveState for Ppu {
    type State = Ppu;
    type Error = Infallible;
    type Meta = crate::state::SnapshotMeta;

    fn save(&self, meta: Self::Meta) -> Result<Snapshot<Self::State, Self::Meta>, Self::Error> {
        Ok(Snapshot {
            meta,
            data: self.clone(),
        })
    }

    fn load(&mut self, snapshot: &Snapshot<Self::State, Self::Meta>) -> Result<(), Self::Error> {
        *self = snapshot.data.clone();
        Ok(())
    }
}
