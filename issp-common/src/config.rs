// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Per-device static configuration and recovery timing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IsspError, Result};
use crate::transport::SiliconId;

// --- ISSP image layout constants ---

/// Address of the security (protection bits) record in an ISSP image.
pub const ISSP_FW_SECURITY_ADDR: u32 = 0x0010_0000;
/// Address of the checksum record in an ISSP image.
pub const ISSP_FW_CHECKSUM_ADDR: u32 = 0x0020_0000;

pub const SILICON_ID_LEN: usize = 4;

// --- Recovery timing ---

pub const RECOVERY_START_DELAY_MS: u64 = 10;
pub const RECOVERY_SETTLE_MS: u64 = 500;
pub const WAKE_LOCK_NAME: &str = "issp-js-recovery";

fn default_security_addr() -> u32 {
    ISSP_FW_SECURITY_ADDR
}

fn default_checksum_addr() -> u32 {
    ISSP_FW_CHECKSUM_ADDR
}

/// Static description of one ISSP target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Firmware image name, used in log messages.
    pub firmware_name: String,
    pub block_size: u32,
    pub block_count: u32,
    /// Flash address of the firmware version byte.
    pub version_addr: u32,
    #[serde(default = "default_security_addr")]
    pub security_addr: u32,
    #[serde(default = "default_checksum_addr")]
    pub checksum_addr: u32,
    /// Silicon ID the chip must report before anything is written.
    pub silicon_id: SiliconId,
    /// Reflash whenever the versions differ, including downgrades.
    #[serde(default)]
    pub force_update: bool,
}

impl DeviceConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DeviceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the geometry and addresses for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(IsspError::InvalidConfig(
                "block_size must be greater than 0".into(),
            ));
        }
        if self.block_count == 0 {
            return Err(IsspError::InvalidConfig(
                "block_count must be greater than 0".into(),
            ));
        }
        if self.block_count > u32::from(u16::MAX) || self.block_size > u32::from(u16::MAX) {
            return Err(IsspError::InvalidConfig(format!(
                "geometry {}x{} does not fit the bridge protocol",
                self.block_count, self.block_size
            )));
        }
        let flash_size = self.block_size.checked_mul(self.block_count).ok_or_else(|| {
            IsspError::InvalidConfig("block_size * block_count overflows".into())
        })?;
        if self.version_addr >= flash_size {
            return Err(IsspError::InvalidConfig(format!(
                "version_addr 0x{:x} lies outside the {} byte flash",
                self.version_addr, flash_size
            )));
        }
        Ok(())
    }

    /// Total flash size in bytes. Only meaningful on a validated config.
    pub fn flash_size(&self) -> u32 {
        self.block_size.saturating_mul(self.block_count)
    }

    /// Addresses the image validator looks for.
    pub fn image_layout(&self) -> ImageLayout {
        ImageLayout {
            expected_size: self.flash_size(),
            security_addr: self.security_addr,
            checksum_addr: self.checksum_addr,
            version_addr: self.version_addr,
        }
    }
}

/// The four addresses an image must cover to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// End address of the flash content (block size * block count).
    pub expected_size: u32,
    pub security_addr: u32,
    pub checksum_addr: u32,
    pub version_addr: u32,
}

/// Timing of the deferred recovery task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Delay between the request and the start of the recovery cycle.
    pub start_delay_ms: u64,
    /// Hardware settle time after the cycle, before the suspend lock is dropped.
    pub settle_delay_ms: u64,
    /// Name of the suspend-inhibiting lock.
    pub wake_lock_name: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: RECOVERY_START_DELAY_MS,
            settle_delay_ms: RECOVERY_SETTLE_MS,
            wake_lock_name: WAKE_LOCK_NAME.to_string(),
        }
    }
}

impl RecoveryConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
