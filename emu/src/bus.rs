//! The memory bus contract consumed by the CPU.
//!
//! The bus itself (wait-states, region decoding, open bus, MMIO routing) is
//! not part of this crate: the CPU only emits typed accesses through the
//! [`Bus`] trait and lets the implementation account for cycles. What the
//! core *does* pin down is the access metadata, because downstream cycle
//! accounting depends on it:
//!
//! - every access carries [`MemoryAccess`] flags marking it sequential or
//!   non-sequential (the first access of a burst is non-sequential),
//! - misaligned word/halfword loads request `ROTATE`, which yields the value
//!   rotated so the addressed byte lands in the low bits,
//! - byte/halfword loads may request `SIGNED` sign extension,
//! - `internal_cycles` advances time without a bus transaction.

use bitflags::bitflags;

bitflags! {
    /// Metadata attached to every bus access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemoryAccess: u8 {
        /// No timing hint; the access is not part of a burst.
        const NONE = 0;
        /// First access of a burst; pays the full wait-state cost.
        const NONSEQ = 1 << 0;
        /// Follow-up access at a contiguous address.
        const SEQ = 1 << 1;
        /// Sign-extend the loaded byte/halfword to 32 bits.
        const SIGNED = 1 << 2;
        /// Rotate a misaligned word/halfword load so the addressed byte
        /// ends up in bits 0-7.
        const ROTATE = 1 << 3;
    }
}

/// Typed memory operations the CPU performs.
///
/// Reads return `u32` so that `SIGNED` and `ROTATE` results fit regardless
/// of the access width; writes take the exact width being stored.
pub trait Bus {
    fn read8(&mut self, address: u32, access: MemoryAccess) -> u32;
    fn read16(&mut self, address: u32, access: MemoryAccess) -> u32;
    fn read32(&mut self, address: u32, access: MemoryAccess) -> u32;

    fn write8(&mut self, address: u32, value: u8, access: MemoryAccess);
    fn write16(&mut self, address: u32, value: u16, access: MemoryAccess);
    fn write32(&mut self, address: u32, value: u32, access: MemoryAccess);

    /// Advance the cycle counter by `count` without a bus transaction.
    fn internal_cycles(&mut self, count: u32);
}
