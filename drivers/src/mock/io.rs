//! Simulated I/O collaborators.
//!
//! [`MockIoOps`] stands in for the environment a driver is initialised
//! with: a device tree holding FTM nodes, a mapper that hands out
//! [`SimulatedFtm`] register windows, and an interrupt service whose
//! registered handlers the test fires by hand. Every step can be made to
//! fail so partial-initialisation paths are reachable.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use super::SimulatedFtm;
use crate::hal::interrupt::{
    Irq, IrqAcknowledge, IrqHandler, IrqId, IrqNumber, IrqOps, TriggerMode,
};
use crate::hal::io::{DeviceTree, IoError, IoMapper, MemAttr, PmemRegion};
use crate::hw::ftm::BLOCK_SIZE;
use crate::peripheral::ftm::FtmId;
use crate::platform::{CurrentPlatform, Platform};

/// Physical base of FTM0, units are 64 KiB apart.
const FTM_BASE: u64 = 0x029d_0000;
const FTM_STRIDE: u64 = 0x1_0000;
/// First FTM interrupt, one line per unit.
const FTM_IRQ_BASE: IrqNumber = 118;

/// A device tree node.
#[derive(Debug, Clone)]
pub struct MockNode {
    pub path: String,
    pub regs: Vec<PmemRegion>,
    pub irqs: Vec<Irq>,
}

#[derive(Debug, Default)]
struct IoState {
    nodes: BTreeMap<String, MockNode>,
    devices: BTreeMap<u64, SimulatedFtm>,
    handlers: BTreeMap<IrqId, (Irq, IrqHandler)>,
    next_irq_id: u32,
    failing_maps: Vec<u64>,
    failing_irqs: Vec<IrqNumber>,
    failing_walks: Vec<String>,
    fail_acks: bool,
    live_mappings: usize,
    unmapped: Vec<usize>,
    unregistered: Vec<IrqId>,
    acks: usize,
}

/// Shared handle onto the simulated environment.
#[derive(Debug, Clone, Default)]
pub struct MockIoOps {
    state: Rc<RefCell<IoState>>,
}

impl MockIoOps {
    /// An empty environment: no device tree nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with all eight Layerscape FTM units present.
    pub fn layerscape() -> Self {
        Self::layerscape_with(|_| SimulatedFtm::new())
    }

    /// Like [`layerscape`](Self::layerscape), choosing each unit's model.
    pub fn layerscape_with(mut make: impl FnMut(FtmId) -> SimulatedFtm) -> Self {
        let io = Self::new();
        for id in FtmId::ALL {
            let index = id.index() as u64;
            io.add_ftm(
                CurrentPlatform::ftm_device_path(id),
                FTM_BASE + index * FTM_STRIDE,
                FTM_IRQ_BASE + id.index() as IrqNumber,
                make(id),
            );
        }
        io
    }

    /// Add a node with one register region and one interrupt.
    pub fn add_ftm(&self, path: &str, base: u64, irq: IrqNumber, device: SimulatedFtm) {
        let node = MockNode {
            path: path.to_string(),
            regs: alloc::vec![PmemRegion { base, length: FTM_STRIDE as usize }],
            irqs: alloc::vec![Irq { number: irq, trigger: TriggerMode::LevelHigh }],
        };
        self.add_node(node);
        self.state.borrow_mut().devices.insert(base, device);
    }

    /// Add an arbitrary node.
    pub fn add_node(&self, node: MockNode) {
        self.state.borrow_mut().nodes.insert(node.path.clone(), node);
    }

    /// Drop the node for `id`, as if it were missing from the device tree.
    pub fn remove_ftm(&self, id: FtmId) {
        self.state
            .borrow_mut()
            .nodes
            .remove(CurrentPlatform::ftm_device_path(id));
    }

    /// The simulated unit behind `id`.
    pub fn device(&self, id: FtmId) -> SimulatedFtm {
        let base = FTM_BASE + id.index() as u64 * FTM_STRIDE;
        self.state.borrow().devices[&base].clone()
    }

    /// Interrupt line of `id`.
    pub fn irq_of(id: FtmId) -> IrqNumber {
        FTM_IRQ_BASE + id.index() as IrqNumber
    }

    /// Make mapping the registers of `id` fail.
    pub fn fail_map(&self, id: FtmId) {
        let base = FTM_BASE + id.index() as u64 * FTM_STRIDE;
        self.state.borrow_mut().failing_maps.push(base);
    }

    /// Make the register walk of `id` fail after its regions have been
    /// handed out, as a node with a malformed trailing entry would.
    pub fn fail_walk_after_map(&self, id: FtmId) {
        self.state
            .borrow_mut()
            .failing_walks
            .push(CurrentPlatform::ftm_device_path(id).to_string());
    }

    /// Make registering the interrupt of `id` fail.
    pub fn fail_irq(&self, id: FtmId) {
        self.state.borrow_mut().failing_irqs.push(Self::irq_of(id));
    }

    /// Make interrupt acknowledgment fail.
    pub fn fail_acks(&self) {
        self.state.borrow_mut().fail_acks = true;
    }

    /// Deliver interrupt `number` to its handler.
    ///
    /// Returns false if no handler is registered for the line.
    pub fn fire(&self, number: IrqNumber) -> bool {
        let handler = self
            .state
            .borrow()
            .handlers
            .values()
            .find(|(irq, _)| irq.number == number)
            .map(|(_, handler)| *handler);

        match handler {
            Some(handler) => {
                let mut ack = MockAck { io: self.clone() };
                handler.invoke(&mut ack);
                true
            }
            None => false,
        }
    }

    /// Deliver the interrupt of `id` if its unit asserts the line.
    pub fn deliver_pending(&self, id: FtmId) -> bool {
        self.device(id).irq_asserted() && self.fire(Self::irq_of(id))
    }

    pub fn is_registered(&self, number: IrqNumber) -> bool {
        self.state
            .borrow()
            .handlers
            .values()
            .any(|(irq, _)| irq.number == number)
    }

    pub fn live_mappings(&self) -> usize {
        self.state.borrow().live_mappings
    }

    /// Lengths passed to each unmap, in order.
    pub fn unmapped(&self) -> Vec<usize> {
        self.state.borrow().unmapped.clone()
    }

    pub fn unregistered(&self) -> Vec<IrqId> {
        self.state.borrow().unregistered.clone()
    }

    pub fn acks(&self) -> usize {
        self.state.borrow().acks
    }
}

struct MockAck {
    io: MockIoOps,
}

impl IrqAcknowledge for MockAck {
    fn acknowledge(&mut self) -> Result<(), IoError> {
        let mut state = self.io.state.borrow_mut();
        if state.fail_acks {
            return Err(IoError::AckFailed);
        }
        state.acks += 1;
        Ok(())
    }
}

impl DeviceTree for MockIoOps {
    type Node = MockNode;

    fn read_path(&mut self, path: &str) -> Result<MockNode, IoError> {
        self.state
            .borrow()
            .nodes
            .get(path)
            .cloned()
            .ok_or(IoError::NodeNotFound)
    }

    fn walk_registers(
        &mut self,
        node: &MockNode,
        f: &mut dyn FnMut(PmemRegion, usize, usize) -> Result<(), IoError>,
    ) -> Result<(), IoError> {
        let count = node.regs.len();
        for (index, region) in node.regs.iter().enumerate() {
            f(*region, index, count)?;
        }
        if self.state.borrow().failing_walks.contains(&node.path) {
            return Err(IoError::BadNode);
        }
        Ok(())
    }

    fn walk_irqs(
        &mut self,
        node: &MockNode,
        f: &mut dyn FnMut(Irq, usize, usize) -> Result<(), IoError>,
    ) -> Result<(), IoError> {
        let count = node.irqs.len();
        for (index, irq) in node.irqs.iter().enumerate() {
            f(*irq, index, count)?;
        }
        Ok(())
    }
}

impl IoMapper for MockIoOps {
    type Mapping = SimulatedFtm;

    fn map(
        &mut self,
        region: PmemRegion,
        _cached: bool,
        _attr: MemAttr,
    ) -> Result<SimulatedFtm, IoError> {
        let mut state = self.state.borrow_mut();
        if state.failing_maps.contains(&region.base) || region.length < BLOCK_SIZE {
            return Err(IoError::MapFailed);
        }
        let device = state
            .devices
            .get(&region.base)
            .cloned()
            .ok_or(IoError::MapFailed)?;
        state.live_mappings += 1;
        Ok(device)
    }

    fn unmap(&mut self, _mapping: SimulatedFtm, length: usize) {
        let mut state = self.state.borrow_mut();
        state.live_mappings -= 1;
        state.unmapped.push(length);
    }
}

impl IrqOps for MockIoOps {
    fn register(&mut self, irq: Irq, handler: IrqHandler) -> Result<IrqId, IoError> {
        let mut state = self.state.borrow_mut();
        if state.failing_irqs.contains(&irq.number) {
            return Err(IoError::IrqUnavailable);
        }
        let id = IrqId(state.next_irq_id);
        state.next_irq_id += 1;
        state.handlers.insert(id, (irq, handler));
        Ok(id)
    }

    fn unregister(&mut self, id: IrqId) -> Result<(), IoError> {
        let mut state = self.state.borrow_mut();
        state
            .handlers
            .remove(&id)
            .ok_or(IoError::IrqNotRegistered)?;
        state.unregistered.push(id);
        Ok(())
    }
}
