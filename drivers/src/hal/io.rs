//! I/O collaborator contracts.
//!
//! Drivers in this crate do not walk the device tree, manage page tables
//! or own the interrupt controller. They are handed an implementation of
//! [`IoOps`] that provides those services and only consume it through
//! the traits below.

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

use crate::hal::interrupt::IrqOps;

/// Errors reported by I/O collaborators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IoError {
    /// No device tree node at the requested path.
    NodeNotFound,
    /// The node does not describe the expected resources.
    BadNode,
    /// Physical memory could not be mapped.
    MapFailed,
    /// The interrupt could not be registered.
    IrqUnavailable,
    /// The interrupt handle is not registered.
    IrqNotRegistered,
    /// The interrupt line could not be acknowledged.
    AckFailed,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::NodeNotFound => write!(f, "Device tree node not found"),
            IoError::BadNode => write!(f, "Device tree node is malformed"),
            IoError::MapFailed => write!(f, "Failed to map physical memory"),
            IoError::IrqUnavailable => write!(f, "Failed to register interrupt"),
            IoError::IrqNotRegistered => write!(f, "Interrupt not registered"),
            IoError::AckFailed => write!(f, "Failed to acknowledge interrupt"),
        }
    }
}

/// A region of physical memory described by the device tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PmemRegion {
    pub base: u64,
    pub length: usize,
}

/// Memory attributes for a mapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemAttr {
    /// Strongly ordered device memory.
    Device,
    /// Normal memory.
    Normal,
}

/// A 32-bit register bus.
///
/// Offsets are in bytes from the start of the mapping. Accesses are raw:
/// no byte order correction is applied.
pub trait RegisterBus {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// Memory-mapped register window accessed with volatile loads and stores.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Wrap a mapped virtual address.
    ///
    /// # Safety
    ///
    /// - `base` must be the start of a live mapping of device registers
    /// - Every offset later passed to the bus must lie inside the mapping
    ///   and be 4-byte aligned
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterBus for Mmio {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}

/// Maps physical regions into the caller's address space.
pub trait IoMapper {
    /// Register window produced by a mapping.
    type Mapping: RegisterBus;

    fn map(
        &mut self,
        region: PmemRegion,
        cached: bool,
        attr: MemAttr,
    ) -> Result<Self::Mapping, IoError>;

    /// Release a mapping. `length` is the length of the mapped region.
    fn unmap(&mut self, mapping: Self::Mapping, length: usize);
}

/// Device tree lookups.
///
/// Walk callbacks receive the item, its index and the total count.
pub trait DeviceTree {
    /// Handle to a node, released when dropped.
    type Node;

    fn read_path(&mut self, path: &str) -> Result<Self::Node, IoError>;

    fn walk_registers(
        &mut self,
        node: &Self::Node,
        f: &mut dyn FnMut(PmemRegion, usize, usize) -> Result<(), IoError>,
    ) -> Result<(), IoError>;

    fn walk_irqs(
        &mut self,
        node: &Self::Node,
        f: &mut dyn FnMut(crate::hal::interrupt::Irq, usize, usize) -> Result<(), IoError>,
    ) -> Result<(), IoError>;
}

/// Everything a driver needs from its environment.
///
/// Implementations are cheap handles onto shared services, so drivers
/// clone them freely.
pub trait IoOps: DeviceTree + IoMapper + IrqOps + Clone {}

impl<T> IoOps for T where T: DeviceTree + IoMapper + IrqOps + Clone {}
