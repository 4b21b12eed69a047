//! Firmware image transfer: page partitioning and the programming
//! state machine.

pub mod page;
pub mod programmer;
