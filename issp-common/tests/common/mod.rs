// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared fixtures: record image builder, scripted transport and recovery doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use issp_common::{
    DependentSubsystem, DeviceConfig, HardwareTransport, IsspError, Level, Line, Result,
    SiliconId, SuspendBlocker, ValidatedImage,
};

pub const SILICON_ID: SiliconId = [0x01, 0x02, 0x03, 0x04];
pub const BLOCK_SIZE: u32 = 64;
pub const BLOCK_COUNT: u32 = 4;
pub const VERSION_ADDR: u32 = 0x10;
pub const SECURITY_ADDR: u32 = 0x0010_0000;
pub const CHECKSUM_ADDR: u32 = 0x0020_0000;

pub fn test_config() -> DeviceConfig {
    DeviceConfig {
        firmware_name: "js_uc.bin".to_string(),
        block_size: BLOCK_SIZE,
        block_count: BLOCK_COUNT,
        version_addr: VERSION_ADDR,
        security_addr: SECURITY_ADDR,
        checksum_addr: CHECKSUM_ADDR,
        silicon_id: SILICON_ID,
        force_update: false,
    }
}

/// Encode records in the binary record format, end marker included.
pub fn encode_records(records: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (address, payload) in records {
        out.extend_from_slice(&address.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        while out.len() % 4 != 0 {
            out.push(0xEE);
        }
    }
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    out
}

/// Flash content of the standard image: byte i is `i`, except the version byte.
pub fn flash_content(version: u8) -> Vec<u8> {
    let mut flash: Vec<u8> = (0..(BLOCK_SIZE * BLOCK_COUNT)).map(|i| i as u8).collect();
    flash[VERSION_ADDR as usize] = version;
    flash
}

pub fn security_bytes() -> Vec<u8> {
    vec![0xAA; BLOCK_COUNT as usize]
}

/// Records of a complete image: two flash halves, security, checksum 0x1234.
pub fn standard_records(version: u8) -> Vec<(u32, Vec<u8>)> {
    let flash = flash_content(version);
    let half = flash.len() / 2;
    vec![
        (0, flash[..half].to_vec()),
        (half as u32, flash[half..].to_vec()),
        (SECURITY_ADDR, security_bytes()),
        (CHECKSUM_ADDR, vec![0x12, 0x34]),
    ]
}

pub fn standard_image(version: u8) -> Vec<u8> {
    encode_records(&standard_records(version))
}

// =============================================================================
// Call log
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reset,
    Run,
    SiliconId,
    ReadBlock { block: u16, offset: u16, len: u16 },
    Program,
    SetLine(Line, Level),
    LineLevel(Line),
    ReleaseLines,
    Teardown,
    Reload,
    SuspendAcquire,
    SuspendRelease,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub thread: String,
    pub call: Call,
}

/// Calls recorded across threads, in execution order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Event>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        let thread = thread::current().name().unwrap_or("unnamed").to_string();
        self.0.lock().push(Event { thread, call });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().iter().map(|e| e.call.clone()).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().iter().filter(|e| &e.call == call).count()
    }
}

// =============================================================================
// Scripted transport
// =============================================================================

/// What the chip answers to the version read.
#[derive(Debug, Clone, Copy)]
pub enum VersionRead {
    Byte(u8),
    Protected,
    Fail,
}

pub struct MockTransport {
    log: CallLog,
    silicon_id: SiliconId,
    version: VersionRead,
    program_error: Option<String>,
    call_delay: Duration,
    levels: [Level; 2],
}

impl MockTransport {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            silicon_id: SILICON_ID,
            version: VersionRead::Byte(0x07),
            program_error: None,
            call_delay: Duration::ZERO,
            levels: [Level::Low, Level::Low],
        }
    }

    pub fn with_version(mut self, version: VersionRead) -> Self {
        self.version = version;
        self
    }

    pub fn with_silicon_id(mut self, id: SiliconId) -> Self {
        self.silicon_id = id;
        self
    }

    pub fn failing_program(mut self, reason: &str) -> Self {
        self.program_error = Some(reason.to_string());
        self
    }

    /// Sleep inside every call, to widen race windows.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    fn enter(&self, call: Call) {
        self.log.record(call);
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }
    }

    fn line_slot(line: Line) -> usize {
        match line {
            Line::Data => 0,
            Line::Clock => 1,
        }
    }
}

impl HardwareTransport for MockTransport {
    fn reset(&mut self) -> Result<()> {
        self.enter(Call::Reset);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.enter(Call::Run);
        Ok(())
    }

    fn silicon_id(&mut self) -> Result<SiliconId> {
        self.enter(Call::SiliconId);
        Ok(self.silicon_id)
    }

    fn read_block(&mut self, block: u16, offset: u16, len: u16) -> Result<Vec<u8>> {
        self.enter(Call::ReadBlock { block, offset, len });
        match self.version {
            VersionRead::Byte(v) => Ok(vec![v; usize::from(len)]),
            VersionRead::Protected => Err(IsspError::ProtectedRegion { block }),
            VersionRead::Fail => Err(IsspError::Transport("bridge timeout".into())),
        }
    }

    fn program(&mut self, _image: &ValidatedImage) -> Result<()> {
        self.enter(Call::Program);
        match &self.program_error {
            Some(reason) => Err(IsspError::Program(reason.clone())),
            None => Ok(()),
        }
    }

    fn set_line(&mut self, line: Line, level: Level) -> Result<()> {
        self.enter(Call::SetLine(line, level));
        self.levels[Self::line_slot(line)] = level;
        Ok(())
    }

    fn line_level(&mut self, line: Line) -> Result<Level> {
        self.enter(Call::LineLevel(line));
        Ok(self.levels[Self::line_slot(line)])
    }

    fn release_lines(&mut self) -> Result<()> {
        self.enter(Call::ReleaseLines);
        Ok(())
    }
}

// =============================================================================
// Recovery doubles
// =============================================================================

pub struct MockDependent {
    log: CallLog,
    fail_teardown: bool,
    call_delay: Duration,
}

impl MockDependent {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_teardown: false,
            call_delay: Duration::ZERO,
        }
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }
}

impl DependentSubsystem for MockDependent {
    fn teardown(&mut self) -> Result<()> {
        self.log.record(Call::Teardown);
        thread::sleep(self.call_delay);
        if self.fail_teardown {
            return Err(IsspError::Transport("usb device busy".into()));
        }
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.log.record(Call::Reload);
        thread::sleep(self.call_delay);
        Ok(())
    }
}

/// Counts acquisitions and releases; optionally logs them into a [`CallLog`].
#[derive(Default)]
pub struct MockSuspend {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    log: Option<CallLog>,
}

impl MockSuspend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn logging(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log: Some(log),
            ..Self::default()
        })
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SuspendBlocker for MockSuspend {
    fn acquire(&self) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(Call::SuspendAcquire);
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(Call::SuspendRelease);
        }
        Ok(())
    }
}
