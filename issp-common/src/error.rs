// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error types shared by every stage of the flash and recovery flows.

use thiserror::Error;

use crate::transport::SiliconId;
use crate::validate::FactSet;

/// Result alias used throughout the crate.
pub type Result<T, E = IsspError> = core::result::Result<T, E>;

/// Errors raised while validating, programming or recovering the microcontroller.
#[derive(Error, Debug)]
pub enum IsspError {
    /// The record structure of the image is broken (truncated record, missing end marker).
    #[error("malformed firmware image: {0}")]
    MalformedImage(String),

    /// One or more of the mandatory image facts were not found.
    #[error("invalid firmware image, missing {0}")]
    InvalidImage(FactSet),

    /// The chip reported a different silicon ID than configured.
    #[error("silicon ID check failed: expected {expected:02x?}, device reported {actual:02x?}")]
    IdentityMismatch {
        expected: SiliconId,
        actual: SiliconId,
    },

    /// The block refuses access under the current protection settings.
    #[error("block {block} is protected")]
    ProtectedRegion { block: u16 },

    /// Writing the firmware failed.
    #[error("firmware programming failed: {0}")]
    Program(String),

    /// Any other hardware I/O failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A handle needed by the recovery path does not exist.
    #[error("{0} unavailable")]
    ResourceUnavailable(&'static str),

    /// Device configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A control request could not be understood.
    #[error("unknown control request: {0}")]
    UnknownControl(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<postcard::Error> for IsspError {
    fn from(e: postcard::Error) -> Self {
        IsspError::Transport(format!("frame codec: {e}"))
    }
}

impl From<serde_json::Error> for IsspError {
    fn from(e: serde_json::Error) -> Self {
        IsspError::InvalidConfig(e.to_string())
    }
}

impl IsspError {
    /// Whether the error must abort the attach cycle.
    ///
    /// Programming failures are reported but the device is still restarted and
    /// the recovery services are still brought up.
    pub fn is_fatal_to_attach(&self) -> bool {
        !matches!(self, IsspError::Program(_))
    }
}
