//! Simulated hardware for testing
//!
//! Register-level model of the FlexTimer block and an in-memory
//! implementation of the I/O collaborators, so the drivers can be
//! exercised on the host without a board.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled

#![cfg(any(test, feature = "mock"))]

mod ftm;
mod io;

pub use ftm::SimulatedFtm;
pub use io::{MockIoOps, MockNode};
