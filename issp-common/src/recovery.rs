// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Recovery coordination for the microcontroller and the USB device behind it.
//!
//! Every hardware-touching operation goes through one lock around
//! [`Hardware`]. Synchronous resets take the lock on the caller's thread;
//! deferred recoveries are executed on a dedicated worker thread after a short
//! delay, while a suspend-inhibiting lock keeps the host awake from the request
//! until the hardware has settled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::RecoveryConfig;
use crate::error::{IsspError, Result};
use crate::transport::{HardwareTransport, Level, Line};

/// Keeps the host from entering suspend while held.
pub trait SuspendBlocker: Send + Sync {
    fn acquire(&self) -> Result<()>;
    fn release(&self) -> Result<()>;
}

/// The USB subsystem that dies with the microcontroller.
pub trait DependentSubsystem: Send {
    /// Unregister the device before the microcontroller goes down.
    fn teardown(&mut self) -> Result<()>;
    /// Register it again once the microcontroller is back.
    fn reload(&mut self) -> Result<()>;
}

/// Held suspend inhibitor, released on drop.
pub struct SuspendGuard {
    blocker: Arc<dyn SuspendBlocker>,
}

impl SuspendGuard {
    pub fn acquire(blocker: Arc<dyn SuspendBlocker>) -> Result<Self> {
        blocker.acquire()?;
        Ok(Self { blocker })
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        if let Err(e) = self.blocker.release() {
            warn!("failed to release suspend blocker: {e}");
        }
    }
}

/// Everything guarded by the hardware lock.
pub struct Hardware {
    transport: Box<dyn HardwareTransport>,
    dependent: Option<Box<dyn DependentSubsystem>>,
}

impl Hardware {
    pub fn new(
        transport: Box<dyn HardwareTransport>,
        dependent: Option<Box<dyn DependentSubsystem>>,
    ) -> Self {
        Self {
            transport,
            dependent,
        }
    }

    /// Put the hardware behind its lock.
    pub fn into_shared(self) -> SharedHardware {
        Arc::new(Mutex::new(self))
    }

    pub fn transport_mut(&mut self) -> &mut dyn HardwareTransport {
        self.transport.as_mut()
    }

    /// Reset the microcontroller only.
    pub fn reset(&mut self) -> Result<()> {
        self.transport.reset()
    }

    /// Tear down the dependent subsystem, reset, then reload it.
    ///
    /// A failed teardown does not stop the reset; the reload runs even if the
    /// reset failed. The first reset/reload error is returned.
    pub fn cycle_with_dependent(&mut self) -> Result<()> {
        let Some(dependent) = self.dependent.as_mut() else {
            warn!("no dependent subsystem, resetting microcontroller only");
            return self.transport.reset();
        };

        if let Err(e) = dependent.teardown() {
            warn!("dependent teardown failed: {e}");
        }
        let reset = self.transport.reset();
        let reload = dependent.reload();
        reset.and(reload)
    }
}

/// Shared handle to the locked hardware.
pub type SharedHardware = Arc<Mutex<Hardware>>;

/// What happened to a deferred recovery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryRequest {
    /// A recovery task was queued.
    Scheduled,
    /// A recovery was already pending and will cover this request.
    Coalesced,
    /// No worker is available; nothing was queued.
    Skipped,
}

struct RecoveryTask {
    suspend: Option<SuspendGuard>,
}

struct RecoveryWorker {
    tx: Option<Sender<RecoveryTask>>,
    handle: Option<JoinHandle<()>>,
}

/// Serializes resets and runs deferred recoveries.
pub struct RecoveryCoordinator {
    hardware: SharedHardware,
    suspend: Option<Arc<dyn SuspendBlocker>>,
    worker: Option<RecoveryWorker>,
    pending: Arc<AtomicBool>,
}

impl RecoveryCoordinator {
    /// Create the coordinator and start its recovery worker.
    ///
    /// If the worker thread cannot be spawned the coordinator still serves
    /// synchronous resets; deferred requests are then skipped.
    pub fn new(
        hardware: SharedHardware,
        suspend: Option<Arc<dyn SuspendBlocker>>,
        config: RecoveryConfig,
    ) -> Self {
        let pending = Arc::new(AtomicBool::new(false));
        let worker = match spawn_worker(hardware.clone(), pending.clone(), config) {
            Ok(worker) => Some(worker),
            Err(e) => {
                error!("can't create recovery worker: {e}");
                None
            }
        };

        Self {
            hardware,
            suspend,
            worker,
            pending,
        }
    }

    /// Coordinator with no deferred-task worker.
    pub fn without_worker(hardware: SharedHardware, suspend: Option<Arc<dyn SuspendBlocker>>) -> Self {
        Self {
            hardware,
            suspend,
            worker: None,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn hardware(&self) -> &SharedHardware {
        &self.hardware
    }

    /// Run `f` with the hardware lock held.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut Hardware) -> R) -> R {
        let mut hw = self.hardware.lock();
        f(&mut hw)
    }

    /// Whether a deferred recovery is queued but not started yet.
    pub fn recovery_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Reset the microcontroller now.
    pub fn reset(&self) -> Result<()> {
        let _suspend = self.hold_suspend();
        let result = self.with_hardware(Hardware::reset);
        info!("toggling reset pin on uC");
        result
    }

    /// Reset the microcontroller and cycle the dependent USB subsystem now.
    pub fn reset_with_dependent(&self) -> Result<()> {
        let _suspend = self.hold_suspend();
        let result = self.with_hardware(Hardware::cycle_with_dependent);
        info!("reset both usb and uC");
        result
    }

    /// Queue a deferred recovery.
    ///
    /// The suspend inhibitor is taken before the task is queued and travels
    /// with it, so the host stays awake until the recovery has settled.
    pub fn request_recovery(&self) -> RecoveryRequest {
        info!("recovery requested");
        let Some(tx) = self.worker.as_ref().and_then(|w| w.tx.as_ref()) else {
            error!("no recovery worker, request dropped");
            return RecoveryRequest::Skipped;
        };

        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("recovery already pending, coalescing request");
            return RecoveryRequest::Coalesced;
        }

        let task = RecoveryTask {
            suspend: self.hold_suspend(),
        };
        if tx.send(task).is_err() {
            self.pending.store(false, Ordering::Release);
            error!("recovery worker is gone, request dropped");
            return RecoveryRequest::Skipped;
        }
        RecoveryRequest::Scheduled
    }

    pub fn set_line(&self, line: Line, level: Level) -> Result<()> {
        self.with_hardware(|hw| hw.transport_mut().set_line(line, level))
    }

    pub fn line_level(&self, line: Line) -> Result<Level> {
        self.with_hardware(|hw| hw.transport_mut().line_level(line))
    }

    /// Close the task queue and wait for the worker.
    ///
    /// Recoveries already queued run to completion first.
    pub fn shutdown(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        drop(worker.tx.take());
        if let Some(handle) = worker.handle.take() {
            match handle.join() {
                Ok(()) => debug!("recovery worker stopped"),
                Err(_) => error!("recovery worker panicked"),
            }
        }
    }

    fn hold_suspend(&self) -> Option<SuspendGuard> {
        let blocker = self.suspend.clone()?;
        match SuspendGuard::acquire(blocker) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("failed to acquire suspend blocker: {e}");
                None
            }
        }
    }
}

impl Drop for RecoveryCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    hardware: SharedHardware,
    pending: Arc<AtomicBool>,
    config: RecoveryConfig,
) -> Result<RecoveryWorker> {
    let (tx, rx) = channel::unbounded();
    let handle = thread::Builder::new()
        .name("issp-recovery".into())
        .spawn(move || worker_main(rx, hardware, pending, config))
        .map_err(IsspError::Io)?;

    Ok(RecoveryWorker {
        tx: Some(tx),
        handle: Some(handle),
    })
}

fn worker_main(
    rx: Receiver<RecoveryTask>,
    hardware: SharedHardware,
    pending: Arc<AtomicBool>,
    config: RecoveryConfig,
) {
    debug!("recovery worker started");
    while let Ok(task) = rx.recv() {
        thread::sleep(config.start_delay());
        pending.store(false, Ordering::Release);
        run_recovery(&hardware, task, &config);
    }
    debug!("recovery worker stopping");
}

fn run_recovery(hardware: &Mutex<Hardware>, task: RecoveryTask, config: &RecoveryConfig) {
    let Some(suspend) = task.suspend else {
        error!("suspend blocker unavailable, skipping recovery");
        return;
    };

    info!("recovery attempt");
    {
        let mut hw = hardware.lock();
        if let Err(e) = hw.cycle_with_dependent() {
            error!("recovery cycle failed: {e}");
        }
    }
    thread::sleep(config.settle_delay());

    // Done resetting, the host may suspend again.
    drop(suspend);
    info!("recovery complete");
}
