//! NXP Layerscape (LS1043A) platform binding.

pub mod ltimer;

pub use ltimer::FtmLtimer;

use common::time::{Hertz, KHZ};

use super::Platform;
use crate::peripheral::ftm::FtmId;

/// Fixed frequency clock of the FlexTimer units.
pub const FIXED_FREQ_CLK_HZ: Hertz = 32 * KHZ;

const FTM_PATHS: [&str; 8] = [
    "/soc/timer@29d0000",
    "/soc/timer@29e0000",
    "/soc/timer@29f0000",
    "/soc/timer@2a00000",
    "/soc/timer@2a10000",
    "/soc/timer@2a20000",
    "/soc/timer@2a30000",
    "/soc/timer@2a40000",
];

pub struct LayerscapePlatform;

impl Platform for LayerscapePlatform {
    fn name() -> &'static str {
        "NXP Layerscape LS1043A"
    }

    fn ftm_device_path(id: FtmId) -> &'static str {
        FTM_PATHS[id.index()]
    }

    fn ftm_fixed_clock_hz() -> Hertz {
        FIXED_FREQ_CLK_HZ
    }

    fn timeout_ftm() -> FtmId {
        FtmId::Ftm0
    }

    fn timestamp_ftm() -> FtmId {
        FtmId::Ftm1
    }
}
