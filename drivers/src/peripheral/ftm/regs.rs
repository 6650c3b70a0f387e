//! FTM register access with byte order correction.
//!
//! Some Layerscape parts wire the FlexTimer block big-endian while the
//! cores run little-endian. The order is probed once per block and every
//! access afterwards goes through the same correction.

use crate::hal::io::RegisterBus;
use crate::hw::ftm::{MAX_COUNT, Reg, Sc};

/// Register block of one FTM unit.
#[derive(Debug)]
pub struct FtmRegisters<B: RegisterBus> {
    bus: B,
    swap: bool,
}

impl<B: RegisterBus> FtmRegisters<B> {
    /// Wrap a mapped register window. Accesses are not swapped until
    /// [`detect_byte_order`](Self::detect_byte_order) says otherwise.
    pub fn new(bus: B) -> Self {
        Self { bus, swap: false }
    }

    /// Probe the bus byte order using the modulo register.
    ///
    /// MOD is 32 bits wide but only its low 16 bits are writable, so
    /// writing all ones reads back as `0x0000_ffff` on a bus with CPU
    /// byte order and as something else on a swapped bus.
    ///
    /// Leaves MOD holding the counter maximum.
    pub fn detect_byte_order(&mut self) -> bool {
        self.bus.write32(Reg::Mod.offset(), 0xffff_ffff);
        self.swap = self.bus.read32(Reg::Mod.offset()) != MAX_COUNT;
        self.swap
    }

    /// Whether accesses are byte swapped.
    pub fn needs_swap(&self) -> bool {
        self.swap
    }

    #[inline]
    fn correct(&self, value: u32) -> u32 {
        if self.swap { value.swap_bytes() } else { value }
    }

    #[inline]
    pub fn read(&self, reg: Reg) -> u32 {
        self.correct(self.bus.read32(reg.offset()))
    }

    #[inline]
    pub fn write(&self, reg: Reg, value: u32) {
        self.bus.write32(reg.offset(), self.correct(value))
    }

    /// Read-modify-write.
    pub fn modify(&self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    pub fn read_sc(&self) -> Sc {
        Sc::from_bits_retain(self.read(Reg::Sc))
    }

    pub fn modify_sc(&self, f: impl FnOnce(Sc) -> Sc) {
        self.modify(Reg::Sc, |sc| f(Sc::from_bits_retain(sc)).bits());
    }

    /// Give the bus back, for unmapping.
    pub fn into_bus(self) -> B {
        self.bus
    }
}
