// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use issp_common::bridge::{BridgeTransport, FlashGeometry};
use issp_common::control::{ControlCommand, ControlReply};
use issp_common::recovery::{Hardware, RecoveryCoordinator};
use issp_common::validate::validate;
use issp_common::{
    DependentSubsystem, DeviceConfig, DeviceSession, FirmwareImage, FlashOutcome, Line,
    RecoveryConfig, SuspendBlocker,
};

use crate::platform::{SysfsWakeLock, UsbAuthorized};
use crate::transport::SerialLink;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Global options shared by every command.
pub struct Target {
    pub port: Option<String>,
    pub config: Option<PathBuf>,
    pub usb_device: Option<PathBuf>,
}

impl Target {
    fn device_config(&self) -> Result<DeviceConfig> {
        let Some(path) = self.config.as_deref() else {
            bail!("this command needs a device configuration (--config FILE)");
        };
        DeviceConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))
    }

    fn open_link(&self) -> Result<SerialLink> {
        let Some(port) = self.port.as_deref() else {
            bail!("this command needs the bridge serial port (--port PORT)");
        };
        SerialLink::new(port)
    }

    fn dependent(&self) -> Option<Box<dyn DependentSubsystem>> {
        self.usb_device
            .as_deref()
            .map(|dev| Box::new(UsbAuthorized::new(dev)) as Box<dyn DependentSubsystem>)
    }

    fn suspend_blocker(&self, recovery: &RecoveryConfig) -> Option<Arc<dyn SuspendBlocker>> {
        SysfsWakeLock::open(&recovery.wake_lock_name)
            .map(|lock| Arc::new(lock) as Arc<dyn SuspendBlocker>)
    }

    /// Bridge transport able to program, with a progress bar.
    fn programming_transport(&self, config: &DeviceConfig) -> Result<BridgeTransport<SerialLink>> {
        let geometry = FlashGeometry::from_config(config)?;
        let link = self.open_link()?;
        println!("Bridge:   {}", link.port_name());

        let pb = ProgressBar::new(u64::from(geometry.block_count));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")?
                .progress_chars("#>-"),
        );

        Ok(BridgeTransport::new(link)
            .with_geometry(geometry)
            .with_progress(Box::new(move |done: u32, total: u32| {
                pb.set_position(u64::from(done));
                if done == total {
                    pb.finish_with_message("Programming complete");
                }
            })))
    }

    /// Coordinator for one-shot resets and line access, without a recovery worker.
    fn coordinator(&self) -> Result<RecoveryCoordinator> {
        let transport = BridgeTransport::new(self.open_link()?);
        let hardware = Hardware::new(Box::new(transport), self.dependent());
        let recovery = RecoveryConfig::default();
        Ok(RecoveryCoordinator::without_worker(
            hardware.into_shared(),
            self.suspend_blocker(&recovery),
        ))
    }

    fn attach(&self, config: DeviceConfig, file: &Path) -> Result<DeviceSession> {
        let firmware = read_firmware(file)?;
        let recovery = RecoveryConfig::default();
        let transport = self.programming_transport(&config)?;

        let mut builder = DeviceSession::builder(config, Box::new(transport))
            .recovery_config(recovery.clone());
        if let Some(dependent) = self.dependent() {
            builder = builder.dependent(dependent);
        }
        if let Some(suspend) = self.suspend_blocker(&recovery) {
            builder = builder.suspend_blocker(suspend);
        }

        builder
            .attach(firmware)
            .with_context(|| format!("Failed to attach with {}", file.display()))
    }
}

fn read_firmware(file: &Path) -> Result<Vec<u8>> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!(
        "Firmware: {} ({} bytes, CRC32: 0x{:08x})",
        file.display(),
        firmware.len(),
        CRC32.checksum(&firmware)
    );
    Ok(firmware)
}

/// Validate a firmware image and print its facts.
pub fn check(target: &Target, file: &Path) -> Result<()> {
    let config = target.device_config()?;
    let image = FirmwareImage::parse(read_firmware(file)?)
        .with_context(|| format!("{} is not a valid record image", file.display()))?;
    let facts = validate(&image, &config.image_layout())
        .with_context(|| format!("Firmware {} invalid", config.firmware_name))?;

    println!("Records:  {}", image.record_count());
    println!("Version:  0x{:02x}", facts.version);
    println!("Checksum: 0x{:04x}", facts.checksum);
    if let Some(security) = image.record(facts.security_record) {
        println!(
            "Security: record #{} at 0x{:08x} ({} bytes)",
            facts.security_record.0,
            security.address,
            security.len()
        );
    }
    println!();
    println!("Firmware {} is valid.", config.firmware_name);

    Ok(())
}

/// Run the attach-time flash flow once, then detach.
pub fn flash(target: &Target, file: &Path, force: bool) -> Result<()> {
    let mut config = target.device_config()?;
    config.force_update |= force;

    let session = target.attach(config, file)?;
    let result = match session.flash_outcome() {
        FlashOutcome::Unchanged => {
            println!("Firmware is up to date, nothing written.");
            Ok(())
        }
        FlashOutcome::Updated => {
            println!("Firmware updated successfully!");
            Ok(())
        }
        FlashOutcome::Failed(e) => Err(anyhow::anyhow!("Firmware update failed: {e}")),
    };
    session.detach();

    result
}

/// Reset the microcontroller, optionally cycling the USB device too.
pub fn reset(target: &Target, with_usb: bool) -> Result<()> {
    if with_usb && target.usb_device.is_none() {
        bail!("--with-usb needs the USB device (--usb-device PATH)");
    }
    let coordinator = target.coordinator()?;

    if with_usb {
        coordinator
            .reset_with_dependent()
            .context("Reset of uC and USB failed")?;
        println!("Reset both USB and uC.");
    } else {
        coordinator.reset().context("Reset failed")?;
        println!("Toggled reset pin on uC.");
    }

    Ok(())
}

/// Read or drive a programming line.
pub fn line(target: &Target, line: Line, level: Option<u32>) -> Result<()> {
    let coordinator = target.coordinator()?;
    let command = match level {
        Some(value) => ControlCommand::SetLine(line, value),
        None => ControlCommand::ShowLine(line),
    };

    match command.dispatch(&coordinator)? {
        ControlReply::Ignored => bail!("Line level must be 0 or 1"),
        reply => println!("{:?}: {}", line, reply),
    }

    Ok(())
}

/// Attach, then serve control requests from stdin until EOF.
pub fn monitor(target: &Target, file: &Path) -> Result<()> {
    let config = target.device_config()?;
    let session = target.attach(config, file)?;
    if let FlashOutcome::Failed(e) = session.flash_outcome() {
        warn!("serving control requests after failed update: {e}");
    }

    info!("ready: reset | usbreset | recover | data [0|1] | clk [0|1]");
    for request in io::stdin().lock().lines() {
        let request = request?;
        if request.trim().is_empty() {
            continue;
        }
        let reply = request
            .parse::<ControlCommand>()
            .and_then(|command| command.dispatch(session.recovery()));
        match reply {
            Ok(reply) => println!("{reply}"),
            Err(e) => println!("error: {e}"),
        }
    }

    session.detach();
    Ok(())
}
