//! Simulated FlexTimer register block.
//!
//! Models the parts of the FTM the driver relies on: the 16-bit counter
//! with modulo reload, the overflow flag and its write-0-to-clear
//! semantics, the clock source gate and an optional byte-swapped bus.
//! Time only moves when the test calls [`SimulatedFtm::advance`].

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::hal::io::RegisterBus;
use crate::hw::ftm::{MAX_COUNT, Reg, Sc};

#[derive(Debug, Default)]
struct FtmState {
    big_endian: bool,
    sc: u32,
    cnt: u32,
    modulo: u32,
    cntin: u32,
    other: BTreeMap<usize, u32>,
    writes: usize,
    sticky_tof: u32,
    tof_clear_attempts: u32,
}

impl FtmState {
    fn device_read(&self, offset: usize) -> u32 {
        match offset {
            o if o == Reg::Sc.offset() => self.sc,
            o if o == Reg::Cnt.offset() => self.cnt,
            o if o == Reg::Mod.offset() => self.modulo,
            o if o == Reg::Cntin.offset() => self.cntin,
            o => self.other.get(&o).copied().unwrap_or(0),
        }
    }

    fn device_write(&mut self, offset: usize, value: u32) {
        self.writes += 1;
        match offset {
            o if o == Reg::Sc.offset() => self.write_sc(value),
            // Any write reloads the counter from CNTIN
            o if o == Reg::Cnt.offset() => self.cnt = self.cntin,
            o if o == Reg::Mod.offset() => self.modulo = value & MAX_COUNT,
            o if o == Reg::Cntin.offset() => self.cntin = value & MAX_COUNT,
            o => {
                self.other.insert(o, value);
            }
        }
    }

    fn write_sc(&mut self, value: u32) {
        let tof = Sc::TOF.bits();
        let mut next = value & 0xff & !tof;

        if self.sc & tof != 0 {
            if value & tof == 0 {
                self.tof_clear_attempts += 1;
                if self.sticky_tof > 0 {
                    // Counter hit MOD during the clear: flag stays set
                    self.sticky_tof -= 1;
                    next |= tof;
                }
            } else {
                next |= tof;
            }
        }

        self.sc = next;
    }

    fn running(&self) -> bool {
        self.sc & Sc::CLKS.bits() != 0
    }

    fn tick(&mut self) {
        if self.cnt == self.modulo {
            self.cnt = self.cntin;
            self.sc |= Sc::TOF.bits();
        } else {
            self.cnt = (self.cnt + 1) & MAX_COUNT;
        }
    }
}

/// Shared handle onto one simulated FTM unit.
///
/// Clones refer to the same unit, so a test keeps one handle while the
/// driver owns another through its mapping.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFtm {
    state: Rc<RefCell<FtmState>>,
}

impl SimulatedFtm {
    /// A unit whose bus has the CPU's byte order.
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit behind a byte-swapping bus.
    pub fn big_endian() -> Self {
        let sim = Self::default();
        sim.state.borrow_mut().big_endian = true;
        sim
    }

    /// Run the counter for `ticks` input clocks, if the clock is enabled.
    pub fn advance(&self, ticks: u32) {
        let mut state = self.state.borrow_mut();
        if !state.running() {
            return;
        }
        for _ in 0..ticks {
            state.tick();
        }
    }

    /// Device view of a register, before any bus swapping.
    pub fn raw(&self, reg: Reg) -> u32 {
        self.state.borrow().device_read(reg.offset())
    }

    pub fn sc(&self) -> Sc {
        Sc::from_bits_retain(self.state.borrow().sc)
    }

    pub fn counter(&self) -> u32 {
        self.state.borrow().cnt
    }

    pub fn modulo(&self) -> u32 {
        self.state.borrow().modulo
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running()
    }

    pub fn irq_enabled(&self) -> bool {
        self.sc().contains(Sc::TOIE)
    }

    pub fn overflow_pending(&self) -> bool {
        self.sc().contains(Sc::TOF)
    }

    /// Whether the unit would currently assert its interrupt line.
    pub fn irq_asserted(&self) -> bool {
        self.sc().contains(Sc::TOF | Sc::TOIE)
    }

    /// Make the next `attempts` TOF clears fail, as erratum A-007728 does
    /// when the counter reaches MOD between the read and the clear.
    pub fn make_tof_sticky(&self, attempts: u32) {
        self.state.borrow_mut().sticky_tof = attempts;
    }

    /// Number of writes that tried to clear a set TOF.
    pub fn tof_clear_attempts(&self) -> u32 {
        self.state.borrow().tof_clear_attempts
    }

    /// Total number of register writes seen by the unit.
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }
}

impl RegisterBus for SimulatedFtm {
    fn read32(&self, offset: usize) -> u32 {
        let state = self.state.borrow();
        let value = state.device_read(offset);
        if state.big_endian { value.swap_bytes() } else { value }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut state = self.state.borrow_mut();
        let value = if state.big_endian { value.swap_bytes() } else { value };
        state.device_write(offset, value);
    }
}
