//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! This module defines generic traits and types for interacting with
//! timer hardware and with the environment that hands it to us. They are
//! implemented by platform-specific code and by the simulated hardware in
//! [`crate::mock`], so drivers never depend on a particular SoC or
//! operating environment.
//!
//! # Available Interfaces
//!
//! - [`timer`]: Timer capabilities, events and the logical timer interface
//! - [`interrupt`]: Interrupt registration and acknowledgment
//! - [`io`]: Device tree lookup, memory mapping and register buses

pub mod interrupt;
pub mod io;
pub mod timer;
