// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Attach/detach lifecycle of one programmed device.
//!
//! A [`DeviceSession`] owns the transport, the dependent subsystem, the suspend
//! blocker and the recovery worker from attach to detach.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{DeviceConfig, RecoveryConfig};
use crate::error::Result;
use crate::flash::{self, FlashOutcome};
use crate::record::FirmwareImage;
use crate::recovery::{
    DependentSubsystem, Hardware, RecoveryCoordinator, SharedHardware, SuspendBlocker,
};
use crate::transport::HardwareTransport;

/// Collects the collaborators of a session before attaching.
pub struct SessionBuilder {
    config: DeviceConfig,
    recovery: RecoveryConfig,
    transport: Box<dyn HardwareTransport>,
    dependent: Option<Box<dyn DependentSubsystem>>,
    suspend: Option<Arc<dyn SuspendBlocker>>,
    spawn_worker: bool,
}

impl SessionBuilder {
    pub fn recovery_config(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn dependent(mut self, dependent: Box<dyn DependentSubsystem>) -> Self {
        self.dependent = Some(dependent);
        self
    }

    pub fn suspend_blocker(mut self, suspend: Arc<dyn SuspendBlocker>) -> Self {
        self.suspend = Some(suspend);
        self
    }

    /// Do not start the deferred recovery worker.
    pub fn without_recovery_worker(mut self) -> Self {
        self.spawn_worker = false;
        self
    }

    /// Flash `firmware` if needed and bring up the recovery services.
    ///
    /// Fails if the image is malformed or invalid, if the silicon ID does not
    /// match, or on a transport error. A failed programming step is logged and
    /// the session is still created.
    pub fn attach(self, firmware: Vec<u8>) -> Result<DeviceSession> {
        let SessionBuilder {
            config,
            recovery,
            transport,
            dependent,
            suspend,
            spawn_worker,
        } = self;

        config.validate()?;
        let hardware: SharedHardware = Hardware::new(transport, dependent).into_shared();

        let image = match FirmwareImage::parse(firmware) {
            Ok(image) => image,
            Err(e) => {
                error!(firmware = %config.firmware_name, "request firmware failed: {e}");
                flash::restart(hardware.lock().transport_mut());
                return Err(e);
            }
        };

        let outcome = {
            let mut hw = hardware.lock();
            flash::run(image, &config, hw.transport_mut())
        };
        let outcome = match outcome {
            FlashOutcome::Failed(e) if e.is_fatal_to_attach() => return Err(e),
            FlashOutcome::Failed(e) => {
                warn!("continuing attach after failed update: {e}");
                FlashOutcome::Failed(e)
            }
            other => other,
        };

        let coordinator = if spawn_worker {
            RecoveryCoordinator::new(hardware, suspend, recovery)
        } else {
            RecoveryCoordinator::without_worker(hardware, suspend)
        };

        info!(firmware = %config.firmware_name, "device attached");
        Ok(DeviceSession {
            config,
            coordinator,
            outcome,
        })
    }
}

/// A device between attach and detach.
pub struct DeviceSession {
    config: DeviceConfig,
    coordinator: RecoveryCoordinator,
    outcome: FlashOutcome,
}

impl DeviceSession {
    pub fn builder(config: DeviceConfig, transport: Box<dyn HardwareTransport>) -> SessionBuilder {
        SessionBuilder {
            config,
            recovery: RecoveryConfig::default(),
            transport,
            dependent: None,
            suspend: None,
            spawn_worker: true,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Outcome of the attach-time flash flow.
    pub fn flash_outcome(&self) -> &FlashOutcome {
        &self.outcome
    }

    pub fn recovery(&self) -> &RecoveryCoordinator {
        &self.coordinator
    }

    /// Stop the recovery worker, waiting for queued recoveries, and release
    /// the hardware.
    pub fn detach(mut self) {
        self.coordinator.shutdown();
        info!(firmware = %self.config.firmware_name, "device detached");
    }
}
