//! Logical timer built from two FlexTimer units.
//!
//! One FTM only ever counts up to 0xffff, so a single unit cannot both
//! free-run for timestamps and be reprogrammed for timeouts. The logical
//! timer uses one unit for each job:
//!
//! - the timeout unit is reprogrammed on every [`set_timeout`]
//! - the timestamp unit free-runs from init and backs [`get_time`]
//!
//! [`set_timeout`]: LogicalTimer::set_timeout
//! [`get_time`]: LogicalTimer::get_time

use alloc::boxed::Box;
use core::mem;

use log::{debug, error};

use crate::hal::io::IoOps;
use crate::hal::timer::{LogicalTimer, TimeoutKind, TimerCallback, TimerError, TimerProperties};
use crate::peripheral::ftm::{FTM_PROPERTIES, FtmConfig, FtmTimer};
use crate::platform::{CurrentPlatform, Platform};

/// Lifecycle of one unit inside the logical timer.
enum FtmSlot<O: IoOps> {
    Uninitialized,
    Ready(Box<FtmTimer<O>>),
    Destroyed,
}

impl<O: IoOps> FtmSlot<O> {
    fn get(&self) -> Result<&FtmTimer<O>, TimerError> {
        match self {
            FtmSlot::Ready(ftm) => Ok(&**ftm),
            _ => Err(TimerError::InvalidArgument),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, FtmSlot::Ready(_))
    }

    /// Tear down the unit if it finished initialising.
    fn destroy(&mut self) {
        if !self.is_ready() {
            return;
        }
        if let FtmSlot::Ready(mut ftm) = mem::replace(self, FtmSlot::Destroyed) {
            ftm.destroy();
        }
    }
}

/// Timeout plus timestamp FTM pair behind the [`LogicalTimer`] interface.
pub struct FtmLtimer<O: IoOps> {
    timeout: FtmSlot<O>,
    timestamp: FtmSlot<O>,
}

impl<O: IoOps> FtmLtimer<O> {
    /// Bring up both units: the timeout unit started, the timestamp unit
    /// free-running.
    ///
    /// `callback` receives timeout events from the timeout unit and
    /// overflow events from the timestamp unit.
    ///
    /// # Errors
    ///
    /// The first error from either unit. Whatever was brought up is torn
    /// down again before returning.
    pub fn new(io_ops: O, callback: Option<TimerCallback>) -> Result<Self, TimerError> {
        let mut ltimer = Self {
            timeout: FtmSlot::Uninitialized,
            timestamp: FtmSlot::Uninitialized,
        };

        if let Err(err) = ltimer.init_units(io_ops, callback) {
            ltimer.teardown();
            return Err(err);
        }

        debug!("ltimer: ready on {}", CurrentPlatform::name());
        Ok(ltimer)
    }

    fn init_units(&mut self, io_ops: O, callback: Option<TimerCallback>) -> Result<(), TimerError> {
        let config = FtmConfig::new(io_ops.clone(), CurrentPlatform::timeout_ftm(), false)
            .with_callback(callback);
        let timeout = FtmTimer::init(config)
            .inspect_err(|_| error!("Failed to init the timeout timer"))?;
        self.timeout = FtmSlot::Ready(timeout);

        self.timeout
            .get()?
            .start()
            .inspect_err(|_| error!("Failed to start the timeout timer"))?;

        let config = FtmConfig::new(io_ops, CurrentPlatform::timestamp_ftm(), true)
            .with_callback(callback);
        let timestamp = FtmTimer::init(config)
            .inspect_err(|_| error!("Failed to init the timestamp timer"))?;
        self.timestamp = FtmSlot::Ready(timestamp);

        self.timestamp
            .get()?
            .freerun()
            .inspect_err(|_| error!("Failed to start the timestamp timer"))?;

        Ok(())
    }

    /// Release every unit that finished initialising.
    fn teardown(&mut self) {
        self.timeout.destroy();
        self.timestamp.destroy();
    }
}

impl<O: IoOps> LogicalTimer for FtmLtimer<O> {
    fn get_time(&self) -> Result<u64, TimerError> {
        Ok(self.timestamp.get()?.get_time())
    }

    fn set_timeout(&mut self, ns: u64, kind: TimeoutKind) -> Result<(), TimerError> {
        let mut ns = ns;
        if kind == TimeoutKind::Absolute {
            let now = self.get_time()?;
            if ns <= now {
                return Err(TimerError::TimeoutExpired);
            }
            ns -= now;
        }

        self.timeout
            .get()?
            .set_timeout(ns, kind == TimeoutKind::Periodic)
    }

    fn reset(&mut self) -> Result<(), TimerError> {
        let timeout = self.timeout.get()?;
        timeout.reset()?;
        timeout.start()?;

        let timestamp = self.timestamp.get()?;
        timestamp.reset()?;
        timestamp.freerun()
    }

    fn properties(&self) -> TimerProperties {
        FTM_PROPERTIES
    }

    fn destroy(mut self) {
        self.teardown();
    }
}

impl<O: IoOps> Drop for FtmLtimer<O> {
    fn drop(&mut self) {
        self.teardown();
    }
}
