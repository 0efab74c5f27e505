// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Attach-time flash flow: validate, check identity, decide, program, restart.

use tracing::{error, info, warn};

use crate::config::DeviceConfig;
use crate::decision::needs_update;
use crate::error::IsspError;
use crate::record::FirmwareImage;
use crate::transport::HardwareTransport;
use crate::validate::ValidatedImage;

/// Result of one flash attempt.
#[derive(Debug)]
pub enum FlashOutcome {
    /// The chip already runs an acceptable version.
    Unchanged,
    /// The image was written and verified.
    Updated,
    Failed(IsspError),
}

impl FlashOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FlashOutcome::Failed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&IsspError> {
        match self {
            FlashOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Run the flash flow and leave the chip running.
///
/// Whatever happens, the transport is told to `run` and its lines are released
/// before returning, and the image is dropped.
pub fn run<T: HardwareTransport + ?Sized>(
    image: FirmwareImage,
    config: &DeviceConfig,
    transport: &mut T,
) -> FlashOutcome {
    let outcome = flash_image(image, config, transport);
    restart(transport);
    outcome
}

fn flash_image<T: HardwareTransport + ?Sized>(
    image: FirmwareImage,
    config: &DeviceConfig,
    transport: &mut T,
) -> FlashOutcome {
    let image = match ValidatedImage::new(image, &config.image_layout()) {
        Ok(image) => image,
        Err(e) => {
            error!(firmware = %config.firmware_name, "firmware invalid: {e}");
            return FlashOutcome::Failed(e);
        }
    };

    let actual = match transport.silicon_id() {
        Ok(id) => id,
        Err(e) => {
            error!("reading silicon ID failed: {e}");
            return FlashOutcome::Failed(e);
        }
    };
    if actual != config.silicon_id {
        error!(
            "silicon ID check failed! expected {:02x?}, got {:02x?}",
            config.silicon_id, actual
        );
        return FlashOutcome::Failed(IsspError::IdentityMismatch {
            expected: config.silicon_id,
            actual,
        });
    }

    let update = match needs_update(
        transport,
        config.version_addr,
        config.block_size,
        image.version(),
        config.force_update,
    ) {
        Ok(update) => update,
        Err(e) => {
            error!("version check failed: {e}");
            return FlashOutcome::Failed(e);
        }
    };
    if !update {
        return FlashOutcome::Unchanged;
    }

    match transport.program(&image) {
        Ok(()) => {
            info!(version = image.version(), "firmware update successfully!");
            FlashOutcome::Updated
        }
        Err(e) => {
            error!("firmware update failed: {e}");
            let e = match e {
                IsspError::Program(_) => e,
                other => IsspError::Program(other.to_string()),
            };
            FlashOutcome::Failed(e)
        }
    }
}

/// Leave programming mode and release the lines, logging failures.
pub(crate) fn restart<T: HardwareTransport + ?Sized>(transport: &mut T) {
    if let Err(e) = transport.run() {
        warn!("failed to restart microcontroller: {e}");
    }
    if let Err(e) = transport.release_lines() {
        warn!("failed to release programming lines: {e}");
    }
}
