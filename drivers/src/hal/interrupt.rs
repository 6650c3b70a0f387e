//! Interrupt registration Hardware Abstraction Layer.
//!
//! Drivers register one handler per interrupt line with the environment's
//! interrupt service. A handler is a plain function plus an opaque token;
//! when the line fires the service calls the function with the token and
//! an acknowledgment handle the driver must use to re-arm the line.

use core::ptr::NonNull;

use crate::hal::io::IoError;

/// Interrupt number type.
pub type IrqNumber = u32;

/// Interrupt trigger mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// Interrupt triggers on a rising edge.
    RisingEdge,
    /// Interrupt triggers on a falling edge.
    FallingEdge,
    /// Interrupt is active when the signal is high.
    LevelHigh,
    /// Interrupt is active when the signal is low.
    LevelLow,
}

/// Interrupt line description, as read from the device tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Irq {
    pub number: IrqNumber,
    pub trigger: TriggerMode,
}

/// Handle returned by a successful registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IrqId(pub u32);

/// Re-arms an interrupt line after the device has been serviced.
pub trait IrqAcknowledge {
    fn acknowledge(&mut self) -> Result<(), IoError>;
}

/// Signature of an interrupt handler.
pub type IrqHandlerFn = fn(token: NonNull<()>, ack: &mut dyn IrqAcknowledge);

/// Registered handler: function plus the token passed back on delivery.
#[derive(Debug, Copy, Clone)]
pub struct IrqHandler {
    func: IrqHandlerFn,
    token: NonNull<()>,
}

impl IrqHandler {
    /// Build a handler.
    ///
    /// # Safety
    ///
    /// `token` must stay valid for what `func` does with it until the
    /// handler is unregistered.
    pub const unsafe fn new(func: IrqHandlerFn, token: NonNull<()>) -> Self {
        Self { func, token }
    }

    /// Deliver one interrupt.
    pub fn invoke(&self, ack: &mut dyn IrqAcknowledge) {
        (self.func)(self.token, ack)
    }
}

/// Interrupt registration service.
pub trait IrqOps {
    fn register(&mut self, irq: Irq, handler: IrqHandler) -> Result<IrqId, IoError>;

    fn unregister(&mut self, id: IrqId) -> Result<(), IoError>;
}
