//! NXP FlexTimer Module (FTM) Driver
//!
//! The FTM is a 16-bit up-counter with a modulo register and a single
//! overflow interrupt. This driver only uses it as a plain timer; the
//! PWM, input capture and quadrature decoder features are left alone.
//!
//! An instance runs in one of two modes:
//!
//! - **Timeout**: the counter is programmed to overflow after the
//!   requested interval, either once or periodically.
//! - **Timestamp**: the counter free-runs over its whole range and every
//!   overflow adds one cycle to a 64-bit nanosecond accumulator, so
//!   [`FtmTimer::get_time`] never wraps.
//!
//! The clock is the 32 kHz fixed-frequency source divided by 128, which
//! gives 4 ms per tick and a longest timeout of about 262 seconds.
//!
//! # Example
//!
//! ```no_run
//! use drivers::peripheral::ftm::{FtmConfig, FtmId, FtmTimer};
//! # fn example<O: drivers::hal::io::IoOps>(io_ops: O) -> Result<(), drivers::hal::timer::TimerError> {
//! let timer = FtmTimer::init(FtmConfig::new(io_ops, FtmId::Ftm1, true))?;
//! timer.freerun()?;
//! let now_ns = timer.get_time();
//! # let _ = now_ns;
//! # Ok(())
//! # }
//! ```

mod regs;

pub use regs::FtmRegisters;

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use common::time::{Hertz, cycles_to_ns, ns_to_cycles};
use log::{debug, error, trace, warn};

use crate::hal::interrupt::{IrqAcknowledge, IrqHandler, IrqId, IrqOps};
use crate::hal::io::{DeviceTree, IoError, IoMapper, IoOps, MemAttr, PmemRegion};
use crate::hal::timer::{TimerCallback, TimerError, TimerEvent, TimerProperties};
use crate::hw::ftm::{BLOCK_SIZE, CLKS_FIXED_FREQ, COUNTER_BITS, MAX_COUNT, Reg, Sc};
use crate::platform::{CurrentPlatform, Platform};

/// Number of interrupt lines per FTM unit.
pub const IRQS_PER_FTM: usize = 1;

/// Capabilities of an FTM used by this driver.
pub const FTM_PROPERTIES: TimerProperties = TimerProperties {
    upcounter: true,
    timeouts: true,
    absolute_timeouts: false,
    relative_timeouts: true,
    periodic_timeouts: true,
    bit_width: COUNTER_BITS,
    irqs: IRQS_PER_FTM as u32,
};

/// FTM units present on the SoC.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FtmId {
    Ftm0,
    Ftm1,
    Ftm2,
    Ftm3,
    Ftm4,
    Ftm5,
    Ftm6,
    Ftm7,
}

impl FtmId {
    pub const ALL: [FtmId; 8] = [
        FtmId::Ftm0,
        FtmId::Ftm1,
        FtmId::Ftm2,
        FtmId::Ftm3,
        FtmId::Ftm4,
        FtmId::Ftm5,
        FtmId::Ftm6,
        FtmId::Ftm7,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for FtmId {
    type Error = TimerError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        FtmId::ALL
            .get(index as usize)
            .copied()
            .ok_or(TimerError::InvalidArgument)
    }
}

/// Bound on the overflow flag clear loop.
///
/// Erratum A-007728: if the counter reaches MOD between reading TOF and
/// writing 0 to it, the clear is lost and TOF (and the interrupt) stay
/// asserted. The driver clears repeatedly until TOF reads back clear or
/// the budget runs out. The default budget is empirical and should be
/// re-checked on new silicon revisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ErratumPolicy {
    pub max_clear_attempts: u32,
}

impl Default for ErratumPolicy {
    fn default() -> Self {
        Self {
            max_clear_attempts: 100,
        }
    }
}

/// Configuration for [`FtmTimer::init`].
#[derive(Debug, Clone)]
pub struct FtmConfig<O: IoOps> {
    /// Environment the unit is bound through.
    pub io_ops: O,
    /// Notified from interrupt context on timeout or overflow.
    pub callback: Option<TimerCallback>,
    /// Which unit to drive.
    pub id: FtmId,
    /// Free-running timestamp counter instead of a timeout source.
    pub is_timestamp: bool,
    pub erratum: ErratumPolicy,
}

impl<O: IoOps> FtmConfig<O> {
    pub fn new(io_ops: O, id: FtmId, is_timestamp: bool) -> Self {
        Self {
            io_ops,
            callback: None,
            id,
            is_timestamp,
            erratum: ErratumPolicy::default(),
        }
    }

    pub fn with_callback(mut self, callback: Option<TimerCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_erratum_policy(mut self, erratum: ErratumPolicy) -> Self {
        self.erratum = erratum;
        self
    }
}

/// One FTM unit.
///
/// Instances live on the heap: their address is the token handed to the
/// interrupt service, so they must not move while the handler is
/// registered. Every operation after [`init`](Self::init) takes `&self`
/// because the interrupt handler may run between any two of them.
pub struct FtmTimer<O: IoOps> {
    io_ops: O,
    id: FtmId,
    regs: Option<FtmRegisters<O::Mapping>>,
    pmem: Option<PmemRegion>,
    irq_id: Option<IrqId>,
    callback: Option<TimerCallback>,
    erratum: ErratumPolicy,
    /// Nanoseconds contributed by completed counter cycles.
    hi_time: AtomicU64,
    freq: Hertz,
    is_timestamp: bool,
    is_periodic: AtomicBool,
}

impl<O: IoOps> FtmTimer<O> {
    /// Bind the unit named by `config.id` and leave it stopped.
    ///
    /// Looks the unit up in the device tree, maps its registers, probes
    /// their byte order, registers the interrupt and resets the counter.
    /// The overflow interrupt is left disabled.
    ///
    /// # Errors
    ///
    /// [`TimerError::NoDevice`] if any resource cannot be acquired. Whatever
    /// was acquired is released first.
    ///
    /// # Panics
    ///
    /// If releasing partially acquired resources fails.
    pub fn init(config: FtmConfig<O>) -> Result<Box<Self>, TimerError> {
        let mut ftm = Box::new(Self {
            io_ops: config.io_ops,
            id: config.id,
            regs: None,
            pmem: None,
            irq_id: None,
            callback: config.callback,
            erratum: config.erratum,
            hi_time: AtomicU64::new(0),
            // Fixed clock only, with the largest divider
            freq: CurrentPlatform::ftm_fixed_clock_hz() / Sc::PS_MAX.prescale_divider(),
            is_timestamp: config.is_timestamp,
            is_periodic: AtomicBool::new(config.is_timestamp),
        });

        if let Err(err) = ftm.bind() {
            error!("ftm{}: failed to bind: {}", ftm.id.index(), err);
            // Tears down whatever was bound; failures in there are fatal
            ftm.destroy();
            return Err(TimerError::NoDevice);
        }

        let regs = ftm.regs()?;
        ftm.irq_disable(regs);
        ftm.clean_alarm(regs);

        debug!(
            "ftm{}: ready, {} Hz, {} mode, byte swap {}",
            ftm.id.index(),
            ftm.freq,
            if ftm.is_timestamp { "timestamp" } else { "timeout" },
            regs.needs_swap()
        );

        Ok(ftm)
    }

    /// Map registers and register the interrupt handler.
    fn bind(&mut self) -> Result<(), IoError> {
        let path = CurrentPlatform::ftm_device_path(self.id);
        let mut dt = self.io_ops.clone();
        let node = dt.read_path(path)?;

        let mut mapper = self.io_ops.clone();
        let slot = &mut self.regs;
        let pmem = &mut self.pmem;
        // The mapping is stored as soon as it exists so `destroy` releases
        // it even if the walk fails afterwards.
        dt.walk_registers(&node, &mut |region, _index, count| {
            if count != 1 || slot.is_some() {
                return Err(IoError::BadNode);
            }
            let mut regs = FtmRegisters::new(mapper.map(region, false, MemAttr::Device)?);
            // The block may sit on a bus of the opposite byte order; probe it
            // before anything else touches the registers.
            regs.detect_byte_order();
            *slot = Some(regs);
            *pmem = Some(region);
            Ok(())
        })?;
        if self.regs.is_none() {
            return Err(IoError::BadNode);
        }

        let token = NonNull::from(&*self).cast::<()>();
        // SAFETY: `self` is boxed and unregisters the handler in `destroy`,
        // which runs before the box is released.
        let handler = unsafe { IrqHandler::new(handle_irq_entry::<O>, token) };
        let mut irq_ops = self.io_ops.clone();
        let mut irq_id = None;
        dt.walk_irqs(&node, &mut |irq, index, count| {
            if index != 0 || count != IRQS_PER_FTM {
                return Err(IoError::BadNode);
            }
            irq_id = Some(irq_ops.register(irq, handler)?);
            Ok(())
        })?;
        self.irq_id = irq_id;
        if self.irq_id.is_none() {
            return Err(IoError::BadNode);
        }

        Ok(())
    }

    fn regs(&self) -> Result<&FtmRegisters<O::Mapping>, TimerError> {
        self.regs.as_ref().ok_or(TimerError::InvalidArgument)
    }

    /// Select the fixed clock with the largest divider, which starts the
    /// counter.
    fn clock_enable(&self, regs: &FtmRegisters<O::Mapping>) {
        regs.modify_sc(|sc| {
            (sc - (Sc::PS | Sc::CLKS)) | Sc::PS_MAX | Sc::clock_source(CLKS_FIXED_FREQ)
        });
    }

    fn clock_disable(&self, regs: &FtmRegisters<O::Mapping>) {
        regs.modify_sc(|sc| sc - (Sc::PS | Sc::CLKS));
    }

    fn irq_enable(&self, regs: &FtmRegisters<O::Mapping>) {
        regs.modify_sc(|sc| sc | Sc::TOIE);
    }

    fn irq_disable(&self, regs: &FtmRegisters<O::Mapping>) {
        regs.modify_sc(|sc| sc - Sc::TOIE);
    }

    /// Clear TOF and report whether a pending overflow was consumed.
    ///
    /// Returns false if TOF was clear, or if it is still set after the
    /// retry budget; the overflow then stays pending for the next caller.
    fn irq_acknowledge(&self, regs: &FtmRegisters<O::Mapping>) -> bool {
        let pending = regs.read_sc().contains(Sc::TOF);
        let mut budget = self.erratum.max_clear_attempts;

        // A-007728: the clear can be lost if the counter hits MOD at the
        // same time, so keep clearing until it sticks.
        while regs.read_sc().contains(Sc::TOF) && budget > 0 {
            budget -= 1;
            regs.modify_sc(|sc| sc - Sc::TOF);
        }

        if !pending {
            return false;
        }

        let attempts = self.erratum.max_clear_attempts - budget;
        if regs.read_sc().contains(Sc::TOF) {
            warn!(
                "ftm{}: TOF still set after {} clear attempts",
                self.id.index(),
                attempts
            );
            return false;
        }
        if attempts > 1 {
            trace!("ftm{}: TOF cleared after {} attempts", self.id.index(), attempts);
        }
        true
    }

    /// Stop the counter and return it to a clean state: no overflow
    /// pending, CNTIN = 0, MOD = max, counter reloaded.
    fn clean_alarm(&self, regs: &FtmRegisters<O::Mapping>) {
        self.clock_disable(regs);
        // A stale overflow belongs to the old programming
        self.irq_acknowledge(regs);
        regs.write(Reg::Cntin, 0);
        regs.write(Reg::Mod, MAX_COUNT);
        // Any write to CNT reloads it from CNTIN
        regs.write(Reg::Cnt, 0);
    }

    /// Add one full counter cycle to the accumulated time.
    fn fold_cycle(&self, regs: &FtmRegisters<O::Mapping>) {
        // Counter runs CNTIN..=MOD, CNTIN is always 0 here
        let cycle = (regs.read(Reg::Mod) & MAX_COUNT) + 1;
        self.hi_time
            .fetch_add(self.ticks_to_ns(cycle), Ordering::Relaxed);
    }

    /// Start counting and enable the overflow interrupt.
    pub fn start(&self) -> Result<(), TimerError> {
        let regs = self.regs().inspect_err(|_| {
            error!("ftm{}: start on an unbound timer", self.id.index());
        })?;

        self.clock_enable(regs);
        self.irq_enable(regs);
        Ok(())
    }

    /// Stop counting and disable the overflow interrupt.
    pub fn stop(&self) -> Result<(), TimerError> {
        let regs = self.regs().inspect_err(|_| {
            error!("ftm{}: stop on an unbound timer", self.id.index());
        })?;

        self.clock_disable(regs);
        self.irq_disable(regs);
        Ok(())
    }

    /// Free-run over the whole counter range, overflowing every cycle.
    pub fn freerun(&self) -> Result<(), TimerError> {
        self.set_timeout(self.ticks_to_ns(MAX_COUNT), true)
    }

    /// Program an overflow `ns` from now, once or every `ns`.
    ///
    /// Replaces any timeout already programmed and restarts the counter.
    ///
    /// # Errors
    ///
    /// [`TimerError::TimeoutOutOfRange`] if `ns` needs more ticks than the
    /// counter holds. The hardware is not touched in that case.
    pub fn set_timeout(&self, ns: u64, periodic: bool) -> Result<(), TimerError> {
        let regs = self.regs().inspect_err(|_| {
            error!("ftm{}: set_timeout on an unbound timer", self.id.index());
        })?;

        let interval = ns_to_cycles(ns, self.freq);
        if interval > MAX_COUNT as u64 {
            debug!(
                "ftm{}: timeout of {} ns needs {} ticks",
                self.id.index(),
                ns,
                interval
            );
            return Err(TimerError::TimeoutOutOfRange);
        }

        self.irq_disable(regs);
        self.clean_alarm(regs);

        self.is_periodic
            .store(periodic || self.is_timestamp, Ordering::Relaxed);

        // TOF is set when the counter goes from MOD back to CNTIN, one tick
        // after reaching MOD
        let modulo = if interval > 1 { interval as u32 - 1 } else { 1 };
        regs.write(Reg::Mod, modulo);

        self.clock_enable(regs);
        self.irq_enable(regs);
        Ok(())
    }

    /// Stop and return to the post-init state with zero elapsed time.
    ///
    /// Register mapping and interrupt registration are kept.
    pub fn reset(&self) -> Result<(), TimerError> {
        self.stop()?;
        let regs = self.regs()?;
        self.clean_alarm(regs);
        self.hi_time.store(0, Ordering::Relaxed);
        self.is_periodic.store(self.is_timestamp, Ordering::Relaxed);
        Ok(())
    }

    /// Current time in nanoseconds.
    ///
    /// Only meaningful in timestamp mode; a timeout instance reads 0.
    pub fn get_time(&self) -> u64 {
        if !self.is_timestamp {
            return 0;
        }
        let Some(regs) = self.regs.as_ref() else {
            return 0;
        };

        let mut cnt = regs.read(Reg::Cnt);
        if self.irq_acknowledge(regs) {
            // Wrapped since the interrupt was last served; the first read
            // may predate the wrap. Fold the cycle now rather than wait for
            // the handler.
            cnt = regs.read(Reg::Cnt);
            self.fold_cycle(regs);
        }

        self.hi_time.load(Ordering::Relaxed) + self.ticks_to_ns(cnt & MAX_COUNT)
    }

    /// Convert counter ticks to nanoseconds at this unit's clock.
    pub fn ticks_to_ns(&self, ticks: u32) -> u64 {
        cycles_to_ns(ticks as u64, self.freq)
    }

    /// Service the overflow interrupt.
    fn handle_irq(&self, ack: &mut dyn IrqAcknowledge) {
        if let Some(regs) = self.regs.as_ref() {
            let pending = self.irq_acknowledge(regs);

            if self.is_timestamp {
                // get_time may already have folded this overflow, in which
                // case TOF was clear
                if pending {
                    self.fold_cycle(regs);
                }
            } else if !self.is_periodic.load(Ordering::Relaxed) {
                self.irq_disable(regs);
                self.clean_alarm(regs);
            }
        }

        if let Err(err) = ack.acknowledge() {
            error!("ftm{}: failed to acknowledge the interrupt", self.id.index());
            panic!("ftm{}: interrupt acknowledge failed: {}", self.id.index(), err);
        }

        if let Some(callback) = self.callback {
            let event = if self.is_timestamp {
                TimerEvent::Overflow
            } else {
                TimerEvent::Timeout
            };
            callback.notify(event);
        }
    }

    /// Stop the unit, unmap its registers and unregister its interrupt.
    ///
    /// Only releases what was acquired, so it is safe on a partially
    /// initialised instance and when called more than once.
    ///
    /// # Panics
    ///
    /// If the interrupt cannot be unregistered.
    pub fn destroy(&mut self) {
        if self.regs.is_some() {
            if let Err(err) = self.stop() {
                panic!("ftm{}: failed to stop before release: {}", self.id.index(), err);
            }
            if let Some(regs) = self.regs.take() {
                let length = self.pmem.take().map_or(BLOCK_SIZE, |pmem| pmem.length);
                self.io_ops.unmap(regs.into_bus(), length);
            }
        }

        if let Some(irq_id) = self.irq_id.take() {
            if let Err(err) = self.io_ops.unregister(irq_id) {
                error!("ftm{}: failed to unregister IRQ {:?}", self.id.index(), irq_id);
                panic!("ftm{}: IRQ unregister failed: {}", self.id.index(), err);
            }
        }
    }

    pub fn id(&self) -> FtmId {
        self.id
    }

    pub fn frequency(&self) -> Hertz {
        self.freq
    }

    pub fn is_timestamp(&self) -> bool {
        self.is_timestamp
    }

    pub fn is_periodic(&self) -> bool {
        self.is_periodic.load(Ordering::Relaxed)
    }

    /// Whether register accesses are byte swapped. False when unbound.
    pub fn needs_byte_swap(&self) -> bool {
        self.regs.as_ref().is_some_and(|regs| regs.needs_swap())
    }

    pub fn properties(&self) -> TimerProperties {
        FTM_PROPERTIES
    }
}

impl<O: IoOps> Drop for FtmTimer<O> {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn handle_irq_entry<O: IoOps>(token: NonNull<()>, ack: &mut dyn IrqAcknowledge) {
    // SAFETY: registered by `FtmTimer::bind` with the address of the boxed
    // timer, which stays registered only while the box is alive.
    let ftm = unsafe { token.cast::<FtmTimer<O>>().as_ref() };
    ftm.handle_irq(ack);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockIoOps, SimulatedFtm};
    use common::time::NS_IN_MS;
    use core::cell::Cell;

    /// 250 Hz: one tick is 4 ms.
    const TICK_NS: u64 = 4 * NS_IN_MS;

    fn count_events(token: *const (), event: TimerEvent) {
        let counts = unsafe { &*(token as *const EventCounts) };
        match event {
            TimerEvent::Timeout => counts.timeouts.set(counts.timeouts.get() + 1),
            TimerEvent::Overflow => counts.overflows.set(counts.overflows.get() + 1),
        }
    }

    #[derive(Default)]
    struct EventCounts {
        timeouts: Cell<u32>,
        overflows: Cell<u32>,
    }

    impl EventCounts {
        fn callback(&self) -> Option<TimerCallback> {
            Some(TimerCallback::new(count_events, self as *const _ as *const ()))
        }
    }

    fn timeout_timer(io: &MockIoOps) -> Box<FtmTimer<MockIoOps>> {
        FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm0, false)).unwrap()
    }

    fn timestamp_timer(io: &MockIoOps) -> Box<FtmTimer<MockIoOps>> {
        FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm1, true)).unwrap()
    }

    #[test]
    fn test_init_leaves_unit_stopped_and_clean() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);

        assert_eq!(ftm.frequency(), 250);
        assert!(!sim.is_running());
        assert!(!sim.irq_enabled());
        assert_eq!(sim.modulo(), MAX_COUNT);
        assert_eq!(sim.counter(), 0);
        assert_eq!(sim.raw(Reg::Cntin), 0);
        assert!(io.is_registered(MockIoOps::irq_of(FtmId::Ftm0)));
        assert_eq!(io.live_mappings(), 1);
        assert!(!ftm.needs_byte_swap());
    }

    #[test]
    fn test_init_detects_swapped_bus() {
        let io = MockIoOps::layerscape_with(|_| SimulatedFtm::big_endian());
        let ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);

        assert!(ftm.needs_byte_swap());
        assert_eq!(sim.modulo(), MAX_COUNT);

        ftm.set_timeout(100 * TICK_NS, false).unwrap();
        assert_eq!(sim.modulo(), 99);
        assert!(sim.is_running());
        assert!(sim.irq_enabled());
        assert_eq!(sim.sc() & Sc::PS, Sc::PS_MAX);
    }

    #[test]
    fn test_byte_order_is_per_instance() {
        let io = MockIoOps::layerscape_with(|id| {
            if id == FtmId::Ftm1 { SimulatedFtm::big_endian() } else { SimulatedFtm::new() }
        });
        let timeout = timeout_timer(&io);
        let timestamp = timestamp_timer(&io);

        assert!(!timeout.needs_byte_swap());
        assert!(timestamp.needs_byte_swap());

        timeout.set_timeout(10 * TICK_NS, false).unwrap();
        timestamp.freerun().unwrap();
        assert_eq!(io.device(FtmId::Ftm0).modulo(), 9);
        assert_eq!(io.device(FtmId::Ftm1).modulo(), MAX_COUNT - 1);
    }

    #[test]
    fn test_init_missing_node_is_no_device() {
        let io = MockIoOps::layerscape();
        io.remove_ftm(FtmId::Ftm0);

        let result = FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm0, false));
        assert!(matches!(result, Err(TimerError::NoDevice)));
        assert_eq!(io.live_mappings(), 0);
    }

    #[test]
    fn test_init_map_failure_is_no_device() {
        let io = MockIoOps::layerscape();
        io.fail_map(FtmId::Ftm2);

        let result = FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm2, false));
        assert!(matches!(result, Err(TimerError::NoDevice)));
        assert!(!io.is_registered(MockIoOps::irq_of(FtmId::Ftm2)));
        assert!(io.unmapped().is_empty());
    }

    #[test]
    fn test_init_irq_failure_unmaps_registers() {
        let io = MockIoOps::layerscape();
        io.fail_irq(FtmId::Ftm0);

        let result = FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm0, false));
        assert!(matches!(result, Err(TimerError::NoDevice)));
        assert_eq!(io.live_mappings(), 0);
        assert_eq!(io.unmapped().len(), 1);
        assert!(io.unregistered().is_empty());
    }

    #[test]
    fn test_register_walk_failure_after_map_unmaps() {
        let io = MockIoOps::layerscape();
        io.fail_walk_after_map(FtmId::Ftm0);

        let result = FtmTimer::init(FtmConfig::new(io.clone(), FtmId::Ftm0, false));
        assert!(matches!(result, Err(TimerError::NoDevice)));
        assert_eq!(io.live_mappings(), 0);
        assert_eq!(io.unmapped(), [0x1_0000]);
        assert!(!io.is_registered(MockIoOps::irq_of(FtmId::Ftm0)));
    }

    #[test]
    fn test_ftm_id_from_index() {
        assert_eq!(FtmId::try_from(0u32), Ok(FtmId::Ftm0));
        assert_eq!(FtmId::try_from(7u32), Ok(FtmId::Ftm7));
        assert_eq!(FtmId::try_from(8u32), Err(TimerError::InvalidArgument));
    }

    #[test]
    fn test_ticks_to_ns() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);

        assert_eq!(ftm.ticks_to_ns(0), 0);
        assert_eq!(ftm.ticks_to_ns(1), TICK_NS);

        let mut last = 0;
        for ticks in (0..=MAX_COUNT).step_by(97) {
            let ns = ftm.ticks_to_ns(ticks);
            assert!(ns >= last);
            last = ns;
        }
    }

    #[test]
    fn test_start_stop_toggle_clock_and_irq() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);

        ftm.start().unwrap();
        assert!(sim.is_running());
        assert!(sim.irq_enabled());
        assert_eq!(sim.sc() & Sc::CLKS, Sc::clock_source(CLKS_FIXED_FREQ));

        ftm.stop().unwrap();
        assert!(!sim.is_running());
        assert!(!sim.irq_enabled());

        // Toggling twice is harmless
        ftm.stop().unwrap();
        ftm.start().unwrap();
        ftm.start().unwrap();
        assert!(sim.is_running());
    }

    #[test]
    fn test_set_timeout_programs_modulo() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);

        ftm.set_timeout(250 * TICK_NS, true).unwrap();
        assert_eq!(sim.modulo(), 249);
        assert!(ftm.is_periodic());

        // Sub-tick and single-tick intervals use the smallest modulo
        ftm.set_timeout(0, false).unwrap();
        assert_eq!(sim.modulo(), 1);
        ftm.set_timeout(TICK_NS, false).unwrap();
        assert_eq!(sim.modulo(), 1);
        assert!(!ftm.is_periodic());
    }

    #[test]
    fn test_set_timeout_out_of_range_touches_nothing() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);

        ftm.set_timeout(100 * TICK_NS, true).unwrap();
        sim.advance(10);
        let writes = sim.writes();

        let too_long = (MAX_COUNT as u64 + 1) * TICK_NS;
        assert_eq!(ftm.set_timeout(too_long, false), Err(TimerError::TimeoutOutOfRange));

        assert_eq!(sim.writes(), writes);
        assert_eq!(sim.modulo(), 99);
        assert_eq!(sim.counter(), 10);
        assert!(sim.is_running());
        assert!(ftm.is_periodic());

        // The largest representable interval is accepted
        ftm.set_timeout(MAX_COUNT as u64 * TICK_NS, false).unwrap();
        assert_eq!(sim.modulo(), MAX_COUNT - 1);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let io = MockIoOps::layerscape();
        let counts = EventCounts::default();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm0, false).with_callback(counts.callback()),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm0);

        ftm.set_timeout(10 * TICK_NS, false).unwrap();
        sim.advance(9);
        assert!(!io.deliver_pending(FtmId::Ftm0));

        sim.advance(1);
        assert!(io.deliver_pending(FtmId::Ftm0));
        assert_eq!(counts.timeouts.get(), 1);
        assert_eq!(io.acks(), 1);

        // Disarmed: no further interrupts without a new timeout
        assert!(!sim.is_running());
        assert!(!sim.irq_enabled());
        sim.advance(1000);
        assert!(!io.deliver_pending(FtmId::Ftm0));
        assert_eq!(counts.timeouts.get(), 1);
    }

    #[test]
    fn test_periodic_refires_until_stopped() {
        let io = MockIoOps::layerscape();
        let counts = EventCounts::default();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm0, false).with_callback(counts.callback()),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm0);

        ftm.set_timeout(25 * TICK_NS, true).unwrap();
        for fired in 1..=5 {
            sim.advance(24);
            assert!(!io.deliver_pending(FtmId::Ftm0));
            sim.advance(1);
            assert!(io.deliver_pending(FtmId::Ftm0));
            assert_eq!(counts.timeouts.get(), fired);
        }

        ftm.stop().unwrap();
        sim.advance(100);
        assert!(!io.deliver_pending(FtmId::Ftm0));
        assert_eq!(counts.timeouts.get(), 5);
    }

    #[test]
    fn test_timeout_instance_reads_zero_time() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);

        ftm.set_timeout(10 * TICK_NS, true).unwrap();
        io.device(FtmId::Ftm0).advance(5);
        assert_eq!(ftm.get_time(), 0);
    }

    #[test]
    fn test_timestamp_is_always_periodic() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        assert!(ftm.is_periodic());

        ftm.set_timeout(10 * TICK_NS, false).unwrap();
        assert!(ftm.is_periodic());
    }

    #[test]
    fn test_timestamp_counts_and_extends_over_overflow() {
        let io = MockIoOps::layerscape();
        let counts = EventCounts::default();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm1, true).with_callback(counts.callback()),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm1);
        let cycle = MAX_COUNT as u64;

        ftm.freerun().unwrap();
        assert_eq!(ftm.get_time(), 0);

        sim.advance(1000);
        assert_eq!(ftm.get_time(), 1000 * TICK_NS);

        // Wrap, then let the interrupt handler fold the cycle
        sim.advance(MAX_COUNT - 1000);
        assert!(io.deliver_pending(FtmId::Ftm1));
        assert_eq!(counts.overflows.get(), 1);
        assert_eq!(ftm.get_time(), cycle * TICK_NS);

        sim.advance(7);
        assert_eq!(ftm.get_time(), (cycle + 7) * TICK_NS);
    }

    #[test]
    fn test_get_time_folds_pending_overflow() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        let sim = io.device(FtmId::Ftm1);
        let cycle = MAX_COUNT as u64;

        ftm.freerun().unwrap();
        sim.advance(MAX_COUNT - 1);
        let before = ftm.get_time();
        assert_eq!(before, (cycle - 1) * TICK_NS);

        // Overflow pending, interrupt not yet served
        sim.advance(1 + 5);
        assert!(sim.overflow_pending());
        let now = ftm.get_time();
        assert_eq!(now, (cycle + 5) * TICK_NS);
        assert!(now > before);
        assert!(!sim.overflow_pending());

        // The late interrupt finds TOF clear and does not fold again
        io.fire(MockIoOps::irq_of(FtmId::Ftm1));
        assert_eq!(ftm.get_time(), (cycle + 5) * TICK_NS);
    }

    #[test]
    fn test_time_is_monotonic_across_many_cycles() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        let sim = io.device(FtmId::Ftm1);

        ftm.freerun().unwrap();
        let mut last = 0;
        for step in 0..40u32 {
            sim.advance(12_345);
            if step % 3 == 0 {
                io.deliver_pending(FtmId::Ftm1);
            }
            let now = ftm.get_time();
            assert!(now > last);
            last = now;
        }
        assert_eq!(last, 40 * 12_345 * TICK_NS);
    }

    #[test]
    fn test_erratum_retries_until_tof_clears() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        let sim = io.device(FtmId::Ftm1);

        ftm.set_timeout(10 * TICK_NS, true).unwrap();
        sim.advance(10);
        sim.make_tof_sticky(3);

        assert!(io.deliver_pending(FtmId::Ftm1));
        assert!(!sim.overflow_pending());
        assert_eq!(sim.tof_clear_attempts(), 4);
        assert_eq!(ftm.get_time(), 10 * TICK_NS);
    }

    #[test]
    fn test_erratum_retry_budget_is_bounded() {
        let io = MockIoOps::layerscape();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm1, true)
                .with_erratum_policy(ErratumPolicy { max_clear_attempts: 5 }),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm1);

        ftm.set_timeout(10 * TICK_NS, true).unwrap();
        sim.advance(10);
        sim.make_tof_sticky(u32::MAX);

        assert!(io.fire(MockIoOps::irq_of(FtmId::Ftm1)));
        assert_eq!(sim.tof_clear_attempts(), 5);
        assert!(sim.overflow_pending());
        assert_eq!(io.acks(), 1);
    }

    #[test]
    #[should_panic(expected = "interrupt acknowledge failed")]
    fn test_failed_acknowledge_is_fatal() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        ftm.set_timeout(TICK_NS * 2, true).unwrap();
        io.device(FtmId::Ftm0).advance(2);
        io.fail_acks();

        io.fire(MockIoOps::irq_of(FtmId::Ftm0));
    }

    #[test]
    fn test_reset_zeroes_elapsed_time() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        let sim = io.device(FtmId::Ftm1);

        ftm.freerun().unwrap();
        sim.advance(MAX_COUNT);
        io.deliver_pending(FtmId::Ftm1);
        sim.advance(50);
        assert!(ftm.get_time() > 0);

        ftm.reset().unwrap();
        assert!(!sim.is_running());
        assert_eq!(ftm.get_time(), 0);
        assert!(ftm.is_periodic());
    }

    #[test]
    fn test_reset_discards_pending_overflow() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        let sim = io.device(FtmId::Ftm1);

        ftm.freerun().unwrap();
        sim.advance(MAX_COUNT + 10);
        assert!(sim.overflow_pending());

        ftm.reset().unwrap();
        assert!(!sim.overflow_pending());
        assert_eq!(ftm.get_time(), 0);

        ftm.freerun().unwrap();
        sim.advance(3);
        assert_eq!(ftm.get_time(), 3 * TICK_NS);
        assert!(!io.deliver_pending(FtmId::Ftm1));
    }

    #[test]
    fn test_set_timeout_discards_stale_overflow() {
        let io = MockIoOps::layerscape();
        let counts = EventCounts::default();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm0, false).with_callback(counts.callback()),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm0);

        // Periodic wrap left unserved
        ftm.set_timeout(10 * TICK_NS, true).unwrap();
        sim.advance(10);
        assert!(sim.irq_asserted());

        ftm.set_timeout(1000 * TICK_NS, false).unwrap();
        assert!(!sim.irq_asserted());

        sim.advance(999);
        assert!(!io.deliver_pending(FtmId::Ftm0));
        sim.advance(1);
        assert!(io.deliver_pending(FtmId::Ftm0));
        assert_eq!(counts.timeouts.get(), 1);
    }

    #[test]
    fn test_stuck_overflow_is_folded_once() {
        let io = MockIoOps::layerscape();
        let ftm = FtmTimer::init(
            FtmConfig::new(io.clone(), FtmId::Ftm1, true)
                .with_erratum_policy(ErratumPolicy { max_clear_attempts: 5 }),
        )
        .unwrap();
        let sim = io.device(FtmId::Ftm1);

        ftm.set_timeout(10 * TICK_NS, true).unwrap();
        sim.advance(10);
        sim.make_tof_sticky(u32::MAX);

        // TOF never clears: nothing is folded, however often it is seen
        assert_eq!(ftm.get_time(), 0);
        assert_eq!(ftm.get_time(), 0);
        assert!(io.fire(MockIoOps::irq_of(FtmId::Ftm1)));
        assert_eq!(ftm.get_time(), 0);
        assert!(sim.overflow_pending());

        // Once it clears the cycle is counted exactly once
        sim.make_tof_sticky(0);
        assert_eq!(ftm.get_time(), 10 * TICK_NS);
        assert_eq!(ftm.get_time(), 10 * TICK_NS);
        assert!(!io.deliver_pending(FtmId::Ftm1));
        assert_eq!(ftm.get_time(), 10 * TICK_NS);
    }

    #[test]
    fn test_destroy_releases_everything_once() {
        let io = MockIoOps::layerscape();
        let mut ftm = timeout_timer(&io);
        let sim = io.device(FtmId::Ftm0);
        ftm.start().unwrap();

        ftm.destroy();
        assert!(!sim.is_running());
        assert!(!sim.irq_enabled());
        assert_eq!(io.live_mappings(), 0);
        assert_eq!(io.unmapped(), [0x1_0000]);
        assert_eq!(io.unregistered().len(), 1);
        assert!(!io.is_registered(MockIoOps::irq_of(FtmId::Ftm0)));

        // Idempotent, and unbound operations are rejected
        ftm.destroy();
        drop(ftm);
        assert_eq!(io.unmapped().len(), 1);
        assert_eq!(io.unregistered().len(), 1);
    }

    #[test]
    fn test_unbound_operations_are_invalid() {
        let io = MockIoOps::layerscape();
        let mut ftm = timestamp_timer(&io);
        ftm.destroy();

        assert_eq!(ftm.start(), Err(TimerError::InvalidArgument));
        assert_eq!(ftm.stop(), Err(TimerError::InvalidArgument));
        assert_eq!(ftm.set_timeout(TICK_NS, false), Err(TimerError::InvalidArgument));
        assert_eq!(ftm.get_time(), 0);
    }

    #[test]
    fn test_drop_unregisters_handler() {
        let io = MockIoOps::layerscape();
        let ftm = timestamp_timer(&io);
        drop(ftm);

        assert!(!io.fire(MockIoOps::irq_of(FtmId::Ftm1)));
        assert_eq!(io.live_mappings(), 0);
    }

    #[test]
    fn test_properties() {
        let io = MockIoOps::layerscape();
        let ftm = timeout_timer(&io);
        let props = ftm.properties();

        assert!(props.upcounter);
        assert!(props.relative_timeouts);
        assert!(props.periodic_timeouts);
        assert!(!props.absolute_timeouts);
        assert_eq!(props.bit_width, 16);
        assert_eq!(props.irqs, 1);
    }
}
