//! Time and frequency unit conversion.
//!
//! Counter hardware reports time in ticks of some input clock. These
//! helpers convert between ticks and nanoseconds for a given frequency
//! without overflowing for any `u64` tick count a 64-bit clock can hold.

/// Frequency in hertz.
pub type Hertz = u32;

pub const NS_IN_US: u64 = 1_000;
pub const NS_IN_MS: u64 = 1_000_000;
pub const NS_IN_S: u64 = 1_000_000_000;

pub const KHZ: Hertz = 1_000;
pub const MHZ: Hertz = 1_000_000;

/// Convert a number of clock cycles at `hz` into nanoseconds.
///
/// Returns 0 for a zero frequency. Results that do not fit in `u64`
/// saturate.
pub fn cycles_to_ns(cycles: u64, hz: Hertz) -> u64 {
    if hz == 0 {
        return 0;
    }

    let ns = (cycles as u128 * NS_IN_S as u128) / hz as u128;
    u64::try_from(ns).unwrap_or(u64::MAX)
}

/// Convert a duration in nanoseconds into clock cycles at `hz`.
///
/// Partial cycles are truncated. Results that do not fit in `u64`
/// saturate.
pub fn ns_to_cycles(ns: u64, hz: Hertz) -> u64 {
    let cycles = (ns as u128 * hz as u128) / NS_IN_S as u128;
    u64::try_from(cycles).unwrap_or(u64::MAX)
}
