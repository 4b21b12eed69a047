//! Page-programming state machine.
//!
//! Drives a full image transfer as a strict sequence of remote calls:
//!
//! ```text
//! sync (ping) → erase app region → per page:
//!     erase page buffer → write chunks (retry ≤ MAX_CHUNK_ATTEMPTS)
//!     → commit page with padded-page CRC
//! → optionally set boot action and reboot
//! ```
//!
//! Retry policy lives here, not in the request channel. A failed chunk
//! write (transport, decode, or protocol error, or remote nonzero
//! status) is retried after a fixed backoff; exhausting the budget,
//! failing the region erase, or failing a commit aborts the whole
//! transfer. After a fatal error the target's flash state is
//! indeterminate — callers must restart from the region erase, never
//! resume.

use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::BoardConfig;
use crate::error::{FlashError, Result};
use crate::flash::page::{Page, split_pages};
use crate::rpc::service::{AppId, BootAction, BootloaderClient};
use crate::rpc::transport::Transport;

/// Send attempts allowed per chunk before the transfer aborts.
pub const MAX_CHUNK_ATTEMPTS: u32 = 5;

/// Ping attempts allowed while synchronising the link.
const MAX_SYNC_ATTEMPTS: u32 = 5;

/// Programs firmware images over a [`BootloaderClient`].
pub struct Programmer<T: Transport> {
    client: BootloaderClient<T>,
    page_size: usize,
    payload_size: usize,
    retry_delay: Duration,
}

impl<T: Transport> Programmer<T> {
    pub fn new(client: BootloaderClient<T>, config: &BoardConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            payload_size: config.payload_size,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Establish the link with a bounded ping loop.
    ///
    /// A serial target may have stale bytes in flight after reset; a few
    /// pings flush both directions into a known state.
    pub fn sync(&mut self) -> Result<()> {
        for attempt in 1..=MAX_SYNC_ATTEMPTS {
            match self.client.ping() {
                Ok(()) => {
                    info!("link established after {attempt} ping(s)");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < MAX_SYNC_ATTEMPTS => {
                    warn!("ping attempt {attempt} failed: {e}");
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    warn!("ping attempt {attempt} failed: {e}");
                    if !e.is_retryable() {
                        return Err(e);
                    }
                }
            }
        }
        Err(FlashError::NoLink.into())
    }

    /// Transfer `image` into application slot `app`.
    pub fn program(&mut self, image: &[u8], app: AppId) -> Result<()> {
        let pages = split_pages(image, self.page_size);
        info!(
            "programming {} bytes as {} page(s) of {} into {app:?}",
            image.len(),
            pages.len(),
            self.page_size
        );

        // Cannot proceed safely on partially erased flash: fatal.
        let status = self.client.erase_app(app)?;
        if status != 0 {
            return Err(FlashError::EraseFailed { status }.into());
        }
        info!("application region erased");

        let total = pages.len();
        for page in &pages {
            info!("writing page {} of {total}", page.index + 1);
            self.client.erase_page_buffer()?;
            self.stage_page(page)?;
            self.commit_page(page, app)?;
        }

        info!("transfer complete: {total} page(s) committed");
        Ok(())
    }

    /// Select the boot target and reboot into it.
    pub fn boot(&mut self, action: BootAction) -> Result<()> {
        let status = self.client.set_boot_action(action)?;
        if status != 0 {
            return Err(FlashError::BootFailed { status }.into());
        }
        info!("boot action set to {action:?}; rebooting target");
        self.client.boot()
    }

    pub fn client_mut(&mut self) -> &mut BootloaderClient<T> {
        &mut self.client
    }

    /// Write one page into the target's page buffer, chunk by chunk.
    fn stage_page(&mut self, page: &Page) -> Result<()> {
        let mut offset = 0;
        while offset < page.data.len() {
            let end = (offset + self.payload_size).min(page.data.len());
            self.write_chunk(page.index, offset, &page.data[offset..end])?;
            offset = end;
        }
        Ok(())
    }

    /// One chunk write with bounded retry and fixed backoff.
    fn write_chunk(&mut self, page: usize, offset: usize, chunk: &[u8]) -> Result<()> {
        for attempt in 1..=MAX_CHUNK_ATTEMPTS {
            match self.client.write_page_buffer(offset as u16, chunk) {
                Ok(0) => return Ok(()),
                Ok(status) => {
                    warn!(
                        "page {page} offset {offset:#x}: remote status {status} \
                         (attempt {attempt}/{MAX_CHUNK_ATTEMPTS})"
                    );
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "page {page} offset {offset:#x}: {e} \
                         (attempt {attempt}/{MAX_CHUNK_ATTEMPTS})"
                    );
                }
                Err(e) => return Err(e),
            }

            if attempt < MAX_CHUNK_ATTEMPTS {
                thread::sleep(self.retry_delay);
            }
        }
        Err(FlashError::RetryBudgetExceeded { page, offset }.into())
    }

    /// Commit the staged page with its padded-page CRC. Nonzero status is
    /// fatal: the target's integrity check failed.
    fn commit_page(&mut self, page: &Page, app: AppId) -> Result<()> {
        let crc = page.crc32(self.page_size);
        let status = self.client.write_page(app, page.index as u16, crc)?;
        if status != 0 {
            return Err(FlashError::CommitFailed { page: page.index, status }.into());
        }
        info!("page {} committed, crc {crc:#010x}", page.index);
        Ok(())
    }
}
