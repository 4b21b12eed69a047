//! Board configuration.
//!
//! Page geometry and link parameters differ per target board; presets
//! cover the supported boards and every field can be overridden from
//! the command line.

use serde::{Deserialize, Serialize};

/// Link and flash-geometry parameters for one target board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Flash page size in bytes.
    pub page_size: usize,
    /// Chunk payload size for page-buffer writes, in bytes.
    pub payload_size: usize,
    /// Serial baud rate in bits/second.
    pub baud_rate: u32,
    /// Reply-frame read deadline in milliseconds.
    pub read_timeout_ms: u64,
    /// Backoff between chunk-write retries in milliseconds.
    pub retry_delay_ms: u64,
}

impl BoardConfig {
    /// V71 board: 512-byte pages at 38400 baud.
    pub fn v71() -> Self {
        Self {
            page_size: 512,
            payload_size: 32,
            baud_rate: 38_400,
            read_timeout_ms: 1_000,
            retry_delay_ms: 100,
        }
    }

    /// RH71 board: 256-byte pages at 19200 baud.
    pub fn rh71() -> Self {
        Self {
            page_size: 256,
            payload_size: 32,
            baud_rate: 19_200,
            read_timeout_ms: 1_000,
            retry_delay_ms: 100,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::v71()
    }
}
