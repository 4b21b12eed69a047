//! Host-side serial bootloader link.
//!
//! Reflashes firmware on an embedded target over a serial byte stream:
//! a bit-packed RPC codec sized for low-bandwidth links, a correlated
//! request/response channel with a 5-bit wrapping sequence space, and a
//! page-programming state machine with bounded per-chunk retry.
//!
//! The library is transport-generic ([`rpc::transport::Transport`]);
//! the bundled implementation runs over a serial port. All calls are
//! synchronous and strictly one-at-a-time — the wire format's tiny
//! sequence space assumes request/reply alternation.

#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod flash;
pub mod rpc;

pub use config::BoardConfig;
pub use error::{Error, Result};
pub use flash::programmer::Programmer;
pub use rpc::service::{AppId, BootAction, BootloaderClient};
pub use rpc::transport::SerialTransport;
