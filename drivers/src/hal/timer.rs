//! Timer Hardware Abstraction Layer.
//!
//! This module defines the platform-independent view of a timer: the
//! capability record a driver advertises, the events it reports, and the
//! logical timer interface that combines one or more hardware units into
//! a single time source with timeouts.

use core::fmt;

/// How the `ns` argument of [`LogicalTimer::set_timeout`] is interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Fire once, `ns` from now.
    Relative,
    /// Fire once when the timer reads `ns`.
    Absolute,
    /// Fire every `ns`, starting `ns` from now.
    Periodic,
}

/// Event delivered to the user callback from interrupt context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A programmed timeout expired.
    Timeout,
    /// The timestamp counter wrapped around.
    Overflow,
}

/// Signature of a user notification function.
///
/// The token is the opaque value handed to [`TimerCallback::new`].
pub type TimerCallbackFn = fn(token: *const (), event: TimerEvent);

/// User notification: a plain function plus the context it needs.
#[derive(Debug, Copy, Clone)]
pub struct TimerCallback {
    func: TimerCallbackFn,
    token: *const (),
}

impl TimerCallback {
    pub const fn new(func: TimerCallbackFn, token: *const ()) -> Self {
        Self { func, token }
    }

    /// Deliver `event` to the callback.
    pub fn notify(&self, event: TimerEvent) {
        (self.func)(self.token, event)
    }
}

/// Static description of what a timer can do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimerProperties {
    /// Counter counts up.
    pub upcounter: bool,
    /// Timer can generate timeouts.
    pub timeouts: bool,
    /// Timeouts can be given as an absolute counter value.
    pub absolute_timeouts: bool,
    /// Timeouts can be given relative to now.
    pub relative_timeouts: bool,
    /// Timeouts can reload automatically.
    pub periodic_timeouts: bool,
    /// Effective width of the counter in bits.
    pub bit_width: u32,
    /// Number of interrupt lines used.
    pub irqs: u32,
}

/// Timer errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Invalid or unusable argument (unknown unit, instance not ready).
    InvalidArgument,
    /// The device could not be found or bound.
    NoDevice,
    /// The requested timeout does not fit in the counter.
    TimeoutOutOfRange,
    /// The requested absolute timeout is not in the future.
    TimeoutExpired,
    /// Operation not supported by this timer.
    NotImplemented,
}

impl TimerError {
    /// Classic errno value for callers that report numeric codes.
    pub const fn errno(self) -> i32 {
        match self {
            TimerError::InvalidArgument => 22,
            TimerError::NoDevice => 19,
            TimerError::TimeoutOutOfRange | TimerError::TimeoutExpired => 62,
            TimerError::NotImplemented => 38,
        }
    }
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::InvalidArgument => write!(f, "Invalid argument"),
            TimerError::NoDevice => write!(f, "No such device"),
            TimerError::TimeoutOutOfRange => write!(f, "Timeout exceeds counter range"),
            TimerError::TimeoutExpired => write!(f, "Timeout already expired"),
            TimerError::NotImplemented => write!(f, "Operation not implemented"),
        }
    }
}

/// A time source with timeouts, built from one or more hardware timers.
pub trait LogicalTimer {
    /// Current time in nanoseconds since the timer was started or reset.
    fn get_time(&self) -> Result<u64, TimerError>;

    /// Resolution of [`get_time`](Self::get_time) in nanoseconds.
    fn get_resolution(&self) -> Result<u64, TimerError> {
        Err(TimerError::NotImplemented)
    }

    /// Arm a timeout.
    ///
    /// # Errors
    ///
    /// - [`TimerError::TimeoutExpired`] for an absolute time not in the future
    /// - [`TimerError::TimeoutOutOfRange`] if the interval cannot be programmed
    fn set_timeout(&mut self, ns: u64, kind: TimeoutKind) -> Result<(), TimerError>;

    /// Stop and restart the timer with zero elapsed time.
    fn reset(&mut self) -> Result<(), TimerError>;

    /// Capabilities of the underlying hardware.
    fn properties(&self) -> TimerProperties;

    /// Release the hardware and the timer itself.
    fn destroy(self)
    where
        Self: Sized;
}
