//! Serial RPC stack.
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ service       │──▶│ client       │──▶│ transport            │
//! │ (typed calls) │   │ (sequencing, │   │ (framed byte channel)│
//! │               │◀──│  correlation)│◀──│                      │
//! └───────────────┘   └──────────────┘   └──────────────────────┘
//!          │                 │
//!          └────────▶ codec ◀┘   (bit-packed header + fields)
//! ```
//!
//! Strictly synchronous: one outstanding request at a time, enforced by
//! the request context's borrow of the client manager.

pub mod client;
pub mod codec;
pub mod service;
pub mod transport;
