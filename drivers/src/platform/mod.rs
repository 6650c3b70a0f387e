//! Platform Abstraction Layer
//!
//! This module binds the generic timer drivers to one SoC: which FTM
//! unit lives at which device tree path, what clock feeds them, and which
//! units back the logical timer. Each supported SoC implements the
//! [`Platform`] trait and is selected with a Cargo feature.
//!
//! # Usage
//!
//! ```rust
//! use drivers::peripheral::ftm::FtmId;
//! use drivers::platform::{CurrentPlatform as Platform, Platform as PlatformTrait};
//!
//! let path = Platform::ftm_device_path(FtmId::Ftm0);
//! let clock_hz = Platform::ftm_fixed_clock_hz();
//! # let _ = (path, clock_hz);
//! ```

use common::time::Hertz;

use crate::peripheral::ftm::FtmId;

/// Platform trait - implemented by each supported platform
pub trait Platform {
    /// Platform name for debugging
    fn name() -> &'static str;

    /// Device tree path of an FTM unit
    fn ftm_device_path(id: FtmId) -> &'static str;

    /// Frequency of the fixed clock source feeding the FTM units, before
    /// the prescaler
    fn ftm_fixed_clock_hz() -> Hertz;

    /// Unit used for timeouts
    fn timeout_ftm() -> FtmId;

    /// Unit kept free-running for timestamps
    fn timestamp_ftm() -> FtmId;
}

// Platform selection based on Cargo features
cfg_if::cfg_if! {
    if #[cfg(feature = "ls1043a")] {
        pub mod layerscape;
        pub use layerscape::LayerscapePlatform as CurrentPlatform;
    } else {
        compile_error!(
            "No platform selected!\n\
            Use: cargo build --features ls1043a"
        );
    }
}
