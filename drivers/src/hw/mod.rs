//! Raw register layouts.

pub mod ftm;
