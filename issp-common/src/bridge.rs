// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! [`HardwareTransport`] on top of the serial programming bridge.
//!
//! The bridge executes individual ISSP primitives. The host drives the
//! programming sequence: erase, stream every flash block from the image in
//! stored order, write the security record, then compare the chip checksum with
//! the one recorded in the image.

use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::{IsspError, Result};
use crate::protocol::{AckStatus, Command, Response, MAX_BLOCK_SIZE};
use crate::transport::{HardwareTransport, Level, Line, SiliconId};
use crate::validate::ValidatedImage;

/// A request/response channel to the bridge.
pub trait BridgeLink: Send {
    /// Send a command and wait for its response.
    fn send_recv(&mut self, cmd: &Command) -> Result<Response>;
}

/// Called after each block with (blocks written, total blocks).
pub type ProgressFn = Box<dyn FnMut(u32, u32) + Send>;

/// Flash geometry needed to stream an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub block_size: u16,
    pub block_count: u16,
}

impl FlashGeometry {
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        let block_size = u16::try_from(config.block_size)
            .ok()
            .filter(|&size| size > 0 && usize::from(size) <= MAX_BLOCK_SIZE)
            .ok_or_else(|| {
                IsspError::InvalidConfig(format!(
                    "block_size {} not supported by the bridge (max {MAX_BLOCK_SIZE})",
                    config.block_size
                ))
            })?;
        let block_count = u16::try_from(config.block_count).map_err(|_| {
            IsspError::InvalidConfig(format!("block_count {} too large", config.block_count))
        })?;
        Ok(Self {
            block_size,
            block_count,
        })
    }
}

/// ISSP transport speaking the bridge protocol over any [`BridgeLink`].
pub struct BridgeTransport<L> {
    link: L,
    geometry: Option<FlashGeometry>,
    progress: Option<ProgressFn>,
}

impl<L: BridgeLink> BridgeTransport<L> {
    /// Transport for resets and line control only; see [`Self::with_geometry`].
    pub fn new(link: L) -> Self {
        Self {
            link,
            geometry: None,
            progress: None,
        }
    }

    /// Flash geometry, required by [`HardwareTransport::program`].
    pub fn with_geometry(mut self, geometry: FlashGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Report block progress while programming.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    fn expect_ack(&mut self, cmd: &Command) -> Result<()> {
        match self.link.send_recv(cmd)? {
            Response::Ack(AckStatus::Ok) => Ok(()),
            Response::Ack(status) => Err(ack_error(cmd, status)),
            other => Err(unexpected(cmd, &other)),
        }
    }
}

fn ack_error(cmd: &Command, status: AckStatus) -> IsspError {
    match (cmd, status) {
        (Command::ReadBlock { block, .. }, AckStatus::Protected)
        | (Command::WriteBlock { block, .. }, AckStatus::Protected) => {
            IsspError::ProtectedRegion { block: *block }
        }
        _ => IsspError::Transport(format!("{} rejected: {status:?}", command_name(cmd))),
    }
}

fn unexpected(cmd: &Command, response: &Response) -> IsspError {
    IsspError::Transport(format!(
        "unexpected response to {}: {response:?}",
        command_name(cmd)
    ))
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Reset => "Reset",
        Command::Run => "Run",
        Command::EnterProgramming => "EnterProgramming",
        Command::ReadBlock { .. } => "ReadBlock",
        Command::EraseAll => "EraseAll",
        Command::WriteBlock { .. } => "WriteBlock",
        Command::WriteSecurity { .. } => "WriteSecurity",
        Command::ReadChecksum => "ReadChecksum",
        Command::SetLine { .. } => "SetLine",
        Command::GetLine { .. } => "GetLine",
        Command::ReleaseLines => "ReleaseLines",
    }
}

impl<L: BridgeLink> HardwareTransport for BridgeTransport<L> {
    fn reset(&mut self) -> Result<()> {
        self.expect_ack(&Command::Reset)
    }

    fn run(&mut self) -> Result<()> {
        self.expect_ack(&Command::Run)
    }

    fn silicon_id(&mut self) -> Result<SiliconId> {
        let cmd = Command::EnterProgramming;
        match self.link.send_recv(&cmd)? {
            Response::SiliconId(id) => Ok(id),
            Response::Ack(status) => Err(ack_error(&cmd, status)),
            other => Err(unexpected(&cmd, &other)),
        }
    }

    fn read_block(&mut self, block: u16, offset: u16, len: u16) -> Result<Vec<u8>> {
        let cmd = Command::ReadBlock { block, offset, len };
        match self.link.send_recv(&cmd)? {
            Response::Data(data) if data.len() == usize::from(len) => Ok(data),
            Response::Data(data) => Err(IsspError::Transport(format!(
                "short read of block {block}: {} of {len} bytes",
                data.len()
            ))),
            Response::Ack(status) => Err(ack_error(&cmd, status)),
            other => Err(unexpected(&cmd, &other)),
        }
    }

    fn program(&mut self, image: &ValidatedImage) -> Result<()> {
        let FlashGeometry {
            block_size,
            block_count,
        } = self
            .geometry
            .ok_or_else(|| IsspError::Program("flash geometry not configured".into()))?;

        info!(blocks = block_count, block_size, "erasing flash");
        self.expect_ack(&Command::EraseAll)
            .map_err(|e| IsspError::Program(format!("erase failed: {e}")))?;

        let mut cursor = image.image().rewind();
        for block in 0..block_count {
            let data: Vec<u8> = cursor.by_ref().take(usize::from(block_size)).collect();
            if data.len() != usize::from(block_size) {
                return Err(IsspError::Program(format!(
                    "image ends inside block {block} ({} of {block_size} bytes)",
                    data.len()
                )));
            }
            self.expect_ack(&Command::WriteBlock { block, data })
                .map_err(|e| IsspError::Program(format!("block {block}: {e}")))?;
            if let Some(progress) = self.progress.as_mut() {
                progress(u32::from(block) + 1, u32::from(block_count));
            }
        }
        debug!("flash blocks written, writing security record");

        let security_len = image
            .security_record()
            .map(|rec| usize::from(rec.len()))
            .unwrap_or_default();
        let security: Vec<u8> = image.security_cursor().take(security_len).collect();
        self.expect_ack(&Command::WriteSecurity { data: security })
            .map_err(|e| IsspError::Program(format!("security write failed: {e}")))?;

        let cmd = Command::ReadChecksum;
        let device_checksum = match self.link.send_recv(&cmd)? {
            Response::Checksum(sum) => sum,
            Response::Ack(status) => return Err(ack_error(&cmd, status)),
            other => return Err(unexpected(&cmd, &other)),
        };
        let expected = image.facts().checksum;
        if device_checksum != expected {
            return Err(IsspError::Program(format!(
                "checksum mismatch: image 0x{expected:04x}, device 0x{device_checksum:04x}"
            )));
        }

        info!(checksum = expected, "flash verified");
        Ok(())
    }

    fn set_line(&mut self, line: Line, level: Level) -> Result<()> {
        self.expect_ack(&Command::SetLine { line, level })
    }

    fn line_level(&mut self, line: Line) -> Result<Level> {
        let cmd = Command::GetLine { line };
        match self.link.send_recv(&cmd)? {
            Response::Level(level) => Ok(level),
            Response::Ack(status) => Err(ack_error(&cmd, status)),
            other => Err(unexpected(&cmd, &other)),
        }
    }

    fn release_lines(&mut self) -> Result<()> {
        self.expect_ack(&Command::ReleaseLines)
    }
}
