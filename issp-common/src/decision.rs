// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Update decision: compare the version byte on the chip with the firmware's.

use tracing::{error, info};

use crate::error::{IsspError, Result};
use crate::transport::HardwareTransport;

/// Upgrade policy on known versions.
///
/// An older chip is always upgraded. A newer chip is only reflashed when
/// `force_update` is set. Equal versions are never reflashed.
pub fn version_policy(device: u8, firmware: u8, force_update: bool) -> bool {
    device < firmware || (device != firmware && force_update)
}

/// Split a flash address into (block index, offset within block).
pub fn version_location(version_addr: u32, block_size: u32) -> Result<(u16, u16)> {
    if block_size == 0 {
        return Err(IsspError::InvalidConfig(
            "block_size must be greater than 0".into(),
        ));
    }
    let block = version_addr / block_size;
    let offset = version_addr - block * block_size;

    let block = u16::try_from(block).map_err(|_| {
        IsspError::InvalidConfig(format!("version block {block} out of range"))
    })?;
    // offset < block_size, and block sizes are bounded by the config check
    let offset = u16::try_from(offset).map_err(|_| {
        IsspError::InvalidConfig(format!("version offset {offset} out of range"))
    })?;
    Ok((block, offset))
}

/// Decide whether the chip must be reflashed with `firmware_version`.
///
/// A protected version block forces the update: its content cannot be
/// trusted. Any other read failure is returned to the caller.
pub fn needs_update<T: HardwareTransport + ?Sized>(
    transport: &mut T,
    version_addr: u32,
    block_size: u32,
    firmware_version: u8,
    force_update: bool,
) -> Result<bool> {
    let (block, offset) = version_location(version_addr, block_size)?;

    let device_version = match transport.read_block(block, offset, 1) {
        Ok(bytes) => *bytes.first().ok_or_else(|| {
            IsspError::Transport(format!("empty read of block {block} offset {offset}"))
        })?,
        Err(IsspError::ProtectedRegion { .. }) => {
            error!(block, "version block is protected, force upgrade!");
            return Ok(true);
        }
        Err(e) => return Err(e),
    };

    let update = version_policy(device_version, firmware_version, force_update);
    if update {
        info!(
            "firmware needs upgrade, version 0x{:02x} -> 0x{:02x}",
            device_version, firmware_version
        );
    } else {
        info!("firmware version {:02x} is latest!", device_version);
    }

    Ok(update)
}
