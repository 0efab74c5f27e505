// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Linux sysfs implementations of the suspend blocker and the dependent USB device.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use issp_common::{DependentSubsystem, IsspError, Result, SuspendBlocker};
use tracing::debug;

const WAKE_LOCK_PATH: &str = "/sys/power/wake_lock";
const WAKE_UNLOCK_PATH: &str = "/sys/power/wake_unlock";

fn write_attr(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path).map_err(|e| {
        IsspError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    file.write_all(value.as_bytes())?;
    Ok(())
}

/// Kernel wakelock driven through `/sys/power/wake_lock`.
pub struct SysfsWakeLock {
    name: String,
}

impl SysfsWakeLock {
    /// Returns `None` when the kernel has no userspace wakelock interface.
    pub fn open(name: &str) -> Option<Self> {
        if Path::new(WAKE_LOCK_PATH).exists() {
            Some(Self {
                name: name.to_string(),
            })
        } else {
            debug!("{WAKE_LOCK_PATH} not present, running without suspend blocker");
            None
        }
    }
}

impl SuspendBlocker for SysfsWakeLock {
    fn acquire(&self) -> Result<()> {
        write_attr(Path::new(WAKE_LOCK_PATH), &self.name)
    }

    fn release(&self) -> Result<()> {
        write_attr(Path::new(WAKE_UNLOCK_PATH), &self.name)
    }
}

/// USB device behind the microcontroller, cycled through its `authorized` attribute.
pub struct UsbAuthorized {
    attr: PathBuf,
}

impl UsbAuthorized {
    /// `device` is the sysfs directory of the USB device, e.g. `/sys/bus/usb/devices/1-1`.
    pub fn new(device: &Path) -> Self {
        Self {
            attr: device.join("authorized"),
        }
    }
}

impl DependentSubsystem for UsbAuthorized {
    fn teardown(&mut self) -> Result<()> {
        debug!(attr = %self.attr.display(), "deauthorizing USB device");
        write_attr(&self.attr, "0")
    }

    fn reload(&mut self) -> Result<()> {
        debug!(attr = %self.attr.display(), "authorizing USB device");
        write_attr(&self.attr, "1")
    }
}
