//! Save-state plumbing shared by every component snapshot in this crate.
//!
//! Each component (CPU, PPU, the top-level [`crate::Nes`]) captures and
//! restores its own *full* snapshot through [`SaveState`]; there is no
//! incremental/delta format here. Rewind buffers or network rollback can be
//! built on top by diffing or compressing the serialized bytes externally.

pub mod cpu;
pub mod nes;
pub mod ppu;

/// Common metadata attached to snapshots to aid compatibility checks.
#[cfg_attr(
    feature = "savestate-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    /// Version of the snapshot payload (per component).
    pub format_version: u32,
    /// Global tick/frame counter when this snapshot was captured.
    pub tick: u64,
    /// Optional ROM hash (e.g., SHA-256) for compatibility checks.
    pub rom_hash: Option<[u8; 32]>,
    /// Optional mapper id/submapper for quick cartridge validation.
    pub mapper: Option<(u16, u8)>,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        Self {
            format_version: 1,
            tick: 0,
            rom_hash: None,
            mapper: None,
        }
    }
}

/// Simple wrapper bundling snapshot metadata with payload.
#[cfg_attr(
    feature = "savestate-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T, M = SnapshotMeta> {
    pub meta: M,
    pub data: T,
}

/// Minimal save/load contract using full snapshots.
///
/// The snapshot payload type is left to implementers. Callers are expected to
/// serialize snapshots externally (e.g., postcard/bincode/serde) and can apply
/// compression or diffing at higher layers.
pub trait SaveState {
    type State;
    type Error;
    type Meta: Clone;

    /// Optional format/version tag. Implementers can bump this when changing
    /// the snapshot layout to let callers reject incompatible data.
    const FORMAT_VERSION: u32 = 1;

    /// Capture a full snapshot of the component state.
    ///
    /// Callers provide metadata (e.g., tick, rom hash); the implementation may
    /// adjust `meta.format_version` as needed.
    fn save(&self, meta: Self::Meta) -> Result<Snapshot<Self::State, Self::Meta>, Self::Error>;

    /// Restore the component from a full snapshot.
    fn load(&mut self, snapshot: &Snapshot<Self::State, Self::Meta>) -> Result<(), Self::Error>;
}

/// Optional extension that allows implementers to expose borrowed views instead
/// of owned copies. This is useful for large buffers (RAM/VRAM) where a
/// zero-copy write-out is preferable.
pub trait SaveStateBorrowed: SaveState {
    type BorrowedState<'a>: 'a
    where
        Self: 'a;

    /// Borrow a full snapshot view. Callers can choose to serialize this view
    /// directly without cloning.
    fn borrow<'a>(
        &'a self,
        meta: Self::Meta,
    ) -> Result<Snapshot<Self::BorrowedState<'a>, Self::Meta>, Self::Error>;
}

/// Fallback borrowed implementation: uses owned copies when a true borrowed
/// view is not provided.
impl<T> SaveStateBorrowed for T
where
    T: SaveState,
    T::State: Clone,
{
    type BorrowedState<'a>
        = T::State
    where
        T: 'a,
        T::State: 'a;

    fn borrow<'a>(
        &'a self,
        meta: Self::Meta,
    ) -> Result<Snapshot<Self::BorrowedState<'a>, Self::Meta>, Self::Error> {
        self.save(meta).map(|snap| Snapshot {
            meta: snap.meta,
            data: snap.data,
        })
    }
}

/// Aggregates several components' save states into one composite snapshot.
///
/// [`crate::state::nes::NesState`] implements the real aggregation for the
/// whole console directly rather than through this trait; it's kept for
/// callers that want to compose a custom subset of components (e.g. CPU+PPU
/// only, skipping APU/cartridge) without going through `Nes` at all.
pub trait StateComposer {
    type FullState;
    type Error;

    fn capture(&mut self, meta: SnapshotMeta) -> Result<Self::FullState, Self::Error>;
    fn apply(&mut self, state: &Self::FullState) -> Result<(), Self::Error>;
}
