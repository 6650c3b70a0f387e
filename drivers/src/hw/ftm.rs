//! FlexTimer Module (FTM) register layout.
//!
//! Every register is 32 bits wide. Only the low 16 bits of the counter
//! related registers (CNT, MOD, CNTIN, CnV) are implemented.

use bitflags::bitflags;

/// Register offsets, in bytes from the start of the block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum Reg {
    /// Status and control
    Sc = 0x00,
    /// Counter
    Cnt = 0x04,
    /// Modulo
    Mod = 0x08,
    /// Counter initial value
    Cntin = 0x4c,
    /// Capture and compare status
    Status = 0x50,
    /// Features mode selection
    Mode = 0x54,
    /// Synchronization
    Sync = 0x58,
    /// Initial state for channel output
    Outinit = 0x5c,
    /// Output mask
    Outmask = 0x60,
    /// Function for linked channels
    Combine = 0x64,
    /// Dead time insertion control
    Deadtime = 0x68,
    /// External trigger
    Exttrig = 0x6c,
    /// Channel polarity
    Pol = 0x70,
    /// Fault mode status
    Fms = 0x74,
    /// Input capture filter control
    Filter = 0x78,
    /// Fault control
    Fltctrl = 0x7c,
    /// Quadrature decoder control and status
    Qdctrl = 0x80,
    /// Configuration
    Conf = 0x84,
    /// Fault input polarity
    Fltpol = 0x88,
    /// Synchronization configuration
    Synconf = 0x8c,
    /// Inverting control
    Invctrl = 0x90,
    /// Software output control
    Swoctrl = 0x94,
    /// PWM load
    Pwmload = 0x98,
}

impl Reg {
    #[inline]
    pub const fn offset(self) -> usize {
        self as usize
    }
}

// Channel registers sit between CNT/MOD and CNTIN. The timer driver never
// touches them; they are listed so the block layout is complete.

/// Number of channel register pairs.
pub const CHANNELS: usize = 8;

/// Offset of channel `n` status and control.
pub const fn channel_sc(n: usize) -> usize {
    0x0c + n * 8
}

/// Offset of channel `n` value.
pub const fn channel_value(n: usize) -> usize {
    0x10 + n * 8
}

/// Size of the register block in bytes.
pub const BLOCK_SIZE: usize = Reg::Pwmload.offset() + 4;

/// Maximum value of the 16-bit counter.
pub const MAX_COUNT: u32 = 0xffff;

/// Effective counter width.
pub const COUNTER_BITS: u32 = 16;

bitflags! {
    /// Status and control register (SC).
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Sc: u32 {
        /// Prescale factor selection, divide by 2^PS.
        const PS = 0b111;
        /// Clock source selection.
        const CLKS = 0b11 << 3;
        /// Center-aligned PWM.
        const CPWMS = 1 << 5;
        /// Timer overflow interrupt enable.
        const TOIE = 1 << 6;
        /// Timer overflow flag, cleared by writing 0 after reading 1.
        const TOF = 1 << 7;
    }
}

/// CLKS value selecting the fixed frequency clock.
pub const CLKS_FIXED_FREQ: u32 = 0b10;

impl Sc {
    /// SC bits selecting clock source `clks`.
    pub const fn clock_source(clks: u32) -> Self {
        Self::from_bits_truncate((clks << 3) & Self::CLKS.bits())
    }

    /// Largest prescaler, divide by 128.
    pub const PS_MAX: Self = Self::PS;

    /// Divider applied by the `PS` field.
    pub const fn prescale_divider(self) -> u32 {
        1 << (self.bits() & Self::PS.bits())
    }
}
