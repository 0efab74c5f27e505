// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Hardware transport contract.
//!
//! The transport owns the clock, data and reset lines of the target and knows
//! how to execute the ISSP vectors. Everything above it only sees this trait.

use serde::{Deserialize, Serialize};

use crate::config::SILICON_ID_LEN;
use crate::error::{IsspError, Result};
use crate::validate::ValidatedImage;

/// Silicon identity bytes reported by the chip in programming mode.
pub type SiliconId = [u8; SILICON_ID_LEN];

/// Programming interface lines that can be driven by hand.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Data,
    Clock,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl TryFrom<u8> for Level {
    type Error = IsspError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Level::Low),
            1 => Ok(Level::High),
            other => Err(IsspError::UnknownControl(format!(
                "line level must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

/// Operations the ISSP programmer exposes to the host.
///
/// Implementations are not expected to serialize access themselves; callers
/// go through the hardware lock of [`crate::recovery::RecoveryCoordinator`].
pub trait HardwareTransport: Send {
    /// Toggle the reset line of the microcontroller.
    fn reset(&mut self) -> Result<()>;

    /// Leave programming mode and let the firmware run.
    fn run(&mut self) -> Result<()>;

    /// Enter programming mode and read the silicon ID.
    fn silicon_id(&mut self) -> Result<SiliconId>;

    /// Read `len` bytes at `offset` of flash block `block`.
    ///
    /// Returns [`IsspError::ProtectedRegion`] if the block is read-protected.
    fn read_block(&mut self, block: u16, offset: u16, len: u16) -> Result<Vec<u8>>;

    /// Erase and write the whole image, then verify it.
    fn program(&mut self, image: &ValidatedImage) -> Result<()>;

    fn set_line(&mut self, line: Line, level: Level) -> Result<()>;

    fn line_level(&mut self, line: Line) -> Result<Level>;

    /// Put the clock and data lines back to high impedance.
    fn release_lines(&mut self) -> Result<()>;
}

impl<T: HardwareTransport + ?Sized> HardwareTransport for Box<T> {
    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn run(&mut self) -> Result<()> {
        (**self).run()
    }

    fn silicon_id(&mut self) -> Result<SiliconId> {
        (**self).silicon_id()
    }

    fn read_block(&mut self, block: u16, offset: u16, len: u16) -> Result<Vec<u8>> {
        (**self).read_block(block, offset, len)
    }

    fn program(&mut self, image: &ValidatedImage) -> Result<()> {
        (**self).program(image)
    }

    fn set_line(&mut self, line: Line, level: Level) -> Result<()> {
        (**self).set_line(line, level)
    }

    fn line_level(&mut self, line: Line) -> Result<Level> {
        (**self).line_level(line)
    }

    fn release_lines(&mut self) -> Result<()> {
        (**self).release_lines()
    }
}
