//! Typed bootloader service calls.
//!
//! One method per remote procedure, each exactly one request/reply
//! exchange. Argument layouts mirror the target's hand-packed shims,
//! which order fields for 32-bit alignment on the device — notably
//! `write_page_buffer` carries the chunk length before the offset, and
//! `write_page` carries the CRC before the page index.

use log::debug;

use crate::error::Result;
use crate::rpc::client::{ClientManager, RequestContext};
use crate::rpc::transport::Transport;

/// Service id of the bootloader on the target's dispatch table.
pub const BOOTLOADER_SERVICE: u8 = 1;

/// Request ids within the bootloader service, in dispatch-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootloaderRequest {
    Ping = 1,
    WritePageBuffer = 2,
    ErasePageBuffer = 3,
    EraseApp = 4,
    WritePage = 5,
    SetBootAction = 6,
    Boot = 7,
}

/// Application slot on the target flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppId {
    App1 = 0,
    App2 = 1,
}

/// Which application the target boots after reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootAction {
    BootApp1 = 0,
    BootApp2 = 1,
}

impl From<AppId> for BootAction {
    fn from(app: AppId) -> Self {
        match app {
            AppId::App1 => Self::BootApp1,
            AppId::App2 => Self::BootApp2,
        }
    }
}

/// Remote-reported operation status; 0 is success.
pub type Status = i8;

/// Client for the target's bootloader service.
pub struct BootloaderClient<T: Transport> {
    manager: ClientManager<T>,
}

impl<T: Transport> BootloaderClient<T> {
    pub fn new(transport: T) -> Self {
        Self { manager: ClientManager::new(transport) }
    }

    fn request(&mut self, id: BootloaderRequest) -> RequestContext<'_, T> {
        self.manager.create_request(BOOTLOADER_SERVICE, id as u8)
    }

    /// Liveness probe. A decoded reply is the answer; no payload.
    pub fn ping(&mut self) -> Result<()> {
        self.request(BootloaderRequest::Ping).perform()?;
        Ok(())
    }

    /// Erase the whole application region for `app`.
    pub fn erase_app(&mut self, app: AppId) -> Result<Status> {
        let mut req = self.request(BootloaderRequest::EraseApp);
        req.encoder().write_u8(app as u8);
        let mut reply = req.perform()?;
        Ok(reply.read_i8()?)
    }

    /// Clear the target's RAM page buffer before staging a page.
    pub fn erase_page_buffer(&mut self) -> Result<()> {
        self.request(BootloaderRequest::ErasePageBuffer).perform()?;
        Ok(())
    }

    /// Stage `data` into the page buffer at byte `offset`.
    ///
    /// Layout: 8-bit list length, u16 offset, then the raw payload bytes.
    /// The chunk length travels in the smallest list-prefix width; chunks
    /// are always well under 256 bytes.
    pub fn write_page_buffer(&mut self, offset: u16, data: &[u8]) -> Result<Status> {
        debug_assert!(data.len() < 256);
        let mut req = self.request(BootloaderRequest::WritePageBuffer);
        req.encoder().start_list(data.len());
        req.encoder().write_u16(offset);
        req.encoder().write_raw(data);
        let mut reply = req.perform()?;
        let status = reply.read_i8()?;
        debug!("write_page_buffer offset {offset:#06x} len {} -> {status}", data.len());
        Ok(status)
    }

    /// Commit the staged page buffer to flash page `page` of `app`,
    /// verified against `crc` on the target side.
    ///
    /// Layout: u8 app id, u32 CRC, u16 page index.
    pub fn write_page(&mut self, app: AppId, page: u16, crc: u32) -> Result<Status> {
        let mut req = self.request(BootloaderRequest::WritePage);
        req.encoder().write_u8(app as u8);
        req.encoder().write_u32(crc);
        req.encoder().write_u16(page);
        let mut reply = req.perform()?;
        let status = reply.read_i8()?;
        debug!("write_page {page} crc {crc:#010x} -> {status}");
        Ok(status)
    }

    /// Select which application the target boots.
    pub fn set_boot_action(&mut self, action: BootAction) -> Result<Status> {
        let mut req = self.request(BootloaderRequest::SetBootAction);
        req.encoder().write_u8(action as u8);
        let mut reply = req.perform()?;
        Ok(reply.read_i8()?)
    }

    /// Reboot the target into the selected application.
    pub fn boot(&mut self) -> Result<()> {
        self.request(BootloaderRequest::Boot).perform()?;
        Ok(())
    }

    /// Direct transport access, e.g. for flushing stale input.
    pub fn transport_mut(&mut self) -> &mut T {
        self.manager.transport_mut()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
