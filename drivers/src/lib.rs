//! FlexTimer Driver Subsystem
//!
//! This crate drives the NXP FlexTimer Module (FTM) found on Layerscape
//! SoCs and builds a logical timer out of two units:
//!
//! # Module Organization
//!
//! - [`hal`]: Platform-independent trait definitions (timer interface and
//!   the I/O collaborators a driver is initialised with)
//! - [`hw`]: FTM register layout
//! - [`peripheral`]: The FTM driver itself
//! - [`platform`]: Platform-specific bindings (SoC level)
//! - [`mock`]: Simulated hardware for tests (`mock` feature)
//!
//! # Design Principles
//!
//! 1. **Separation of Concerns**: Platform code is separate from peripheral code
//! 2. **Explicit Environment**: Device tree, mapping and interrupts come in
//!    through traits, never from globals
//! 3. **Interrupt Safety**: Everything the interrupt handler touches is atomic
//!
//! # Usage Example
//!
//! ```no_run
//! use drivers::hal::timer::{LogicalTimer, TimeoutKind};
//! use drivers::platform::layerscape::FtmLtimer;
//! # fn example<O: drivers::hal::io::IoOps>(io_ops: O) -> Result<(), drivers::hal::timer::TimerError> {
//!
//! let mut ltimer = FtmLtimer::new(io_ops, None)?;
//! let now = ltimer.get_time()?;
//! ltimer.set_timeout(now + 1_000_000_000, TimeoutKind::Absolute)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod hal;
pub mod hw;
pub mod mock;
pub mod peripheral;
pub mod platform;

// Re-export commonly used types
pub use hal::timer::{LogicalTimer, TimeoutKind, TimerCallback, TimerError, TimerEvent};
pub use peripheral::ftm::{FtmConfig, FtmId, FtmTimer};
pub use platform::layerscape::FtmLtimer;
