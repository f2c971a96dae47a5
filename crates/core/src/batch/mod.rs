//! Per batch resource state bookkeeping and the barriers derived from it.

pub mod barrier;
pub mod batch_data;
pub mod error;
