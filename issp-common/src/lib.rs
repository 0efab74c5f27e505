// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware verification, re-flashing and recovery for ISSP-programmed microcontrollers.
//!
//! The crate is split along the attach-time data flow:
//! - [`record`]: binary record store and sequential read cursor over a firmware image
//! - [`validate`]: extraction of the four mandatory image facts
//! - [`decision`]: on-device version read and upgrade policy
//! - [`flash`]: validate -> identity check -> decide -> program, always restarting the chip
//! - [`recovery`]: hardware lock, suspend inhibitor and deferred recovery of the USB side
//! - [`session`]: attach/detach lifecycle tying the above together
//!
//! The bit-banged programming protocol is behind the [`transport::HardwareTransport`]
//! trait; [`bridge`] implements it on top of the serial programming bridge protocol
//! defined in [`protocol`].

pub mod bridge;
pub mod config;
pub mod control;
pub mod decision;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod record;
pub mod recovery;
pub mod session;
pub mod transport;
pub mod validate;

// Re-export commonly used types
pub use config::{DeviceConfig, ImageLayout, RecoveryConfig};
pub use config::{ISSP_FW_CHECKSUM_ADDR, ISSP_FW_SECURITY_ADDR, SILICON_ID_LEN};
pub use error::{IsspError, Result};
pub use flash::FlashOutcome;
pub use record::{FirmwareImage, ReadCursor, Record, RecordIndex};
pub use recovery::{DependentSubsystem, RecoveryCoordinator, RecoveryRequest, SuspendBlocker};
pub use session::DeviceSession;
pub use transport::{HardwareTransport, Level, Line, SiliconId};
pub use validate::{FactSet, ImageFacts, ValidatedImage};
