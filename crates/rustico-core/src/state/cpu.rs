use std::convert::Infallible;

use crate::cpu::Cpu;
use crate::state::{SaveState, Snapshot};

/// Minimal `SaveState` implementation for the CPU: [`Cpu`] is small and
/// `Copy`, so a full snapshot is just a clone.
impl SaveState for Cpu {
    type State = Cpu;
    type Error = Infallible;
    type Meta = crate::state::SnapshotMeta;

    fn save(&self, meta: Self::Meta) -> Result<Snapshot<Self::State, Self::Meta>, Self::Error> {
        Ok(Snapshot { meta, data: *self })
    }

    fn load(&mut self, snapshot: &Snapshot<Self::State, Self::Meta>) -> Result<(), Self::Error> {
        *self = snapshot.data;
        Ok(())
    }
}
