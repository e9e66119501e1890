pub mod apu;
pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod error;
pub(crate) mod mem_block;
pub mod memory;
pub mod nes;
pub mod ppu;
pub mod reset_kind;
pub mod state;

pub use nes::Nes;
