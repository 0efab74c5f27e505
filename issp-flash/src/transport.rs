// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial link to the ISSP programming bridge.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;

use issp_common::bridge::BridgeLink;
use issp_common::protocol::{
    decode_frame, encode_frame, Command, Response, BRIDGE_BAUD_RATE, MAX_FRAME_SIZE,
};
use issp_common::IsspError;

/// Default timeout for serial operations in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Erasing the whole flash takes much longer than other primitives.
pub const ERASE_TIMEOUT_MS: u64 = 30_000;

/// USB CDC link to the bridge.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    rx_buf: Vec<u8>,
    timeout: Duration,
}

impl SerialLink {
    /// Open the bridge on the specified serial port.
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_timeout(port_name, DEFAULT_TIMEOUT_MS)
    }

    /// Open the bridge with a custom timeout.
    pub fn with_timeout(port_name: &str, timeout_ms: u64) -> Result<Self> {
        let timeout = Duration::from_millis(timeout_ms);
        let port = serialport::new(port_name, BRIDGE_BAUD_RATE)
            .timeout(timeout)
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self {
            port,
            rx_buf: Vec::with_capacity(MAX_FRAME_SIZE),
            timeout,
        })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    fn send(&mut self, cmd: &Command) -> Result<(), IsspError> {
        let frame = encode_frame(cmd)?;
        if frame.len() > MAX_FRAME_SIZE {
            return Err(IsspError::Transport(format!(
                "command frame of {} bytes exceeds {MAX_FRAME_SIZE}",
                frame.len()
            )));
        }
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Response, IsspError> {
        self.rx_buf.clear();
        let mut byte = [0u8; 1];

        // Read until we get delimiter (0x00)
        loop {
            match self.port.read(&mut byte) {
                Ok(1) => {
                    self.rx_buf.push(byte[0]);
                    if byte[0] == 0 {
                        break;
                    }
                    if self.rx_buf.len() > MAX_FRAME_SIZE {
                        return Err(IsspError::Transport(format!(
                            "response exceeds {MAX_FRAME_SIZE} bytes without delimiter"
                        )));
                    }
                }
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(IsspError::Transport(
                        "timeout waiting for bridge response".into(),
                    ));
                }
                Err(e) => return Err(IsspError::Io(e)),
            }
        }

        let raw_len = self.rx_buf.len();
        decode_frame(&mut self.rx_buf).map_err(|e| {
            IsspError::Transport(format!("bad response ({raw_len} raw bytes): {e}"))
        })
    }

    fn drain_rx(&mut self) {
        let mut buf = [0u8; 64];
        let _ = self.port.set_timeout(Duration::from_millis(10));
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
        let _ = self.port.set_timeout(self.timeout);
    }

    fn exchange(&mut self, cmd: &Command) -> Result<Response, IsspError> {
        self.drain_rx();
        self.send(cmd)?;
        self.receive()
    }
}

impl BridgeLink for SerialLink {
    fn send_recv(&mut self, cmd: &Command) -> Result<Response, IsspError> {
        if !matches!(cmd, Command::EraseAll) {
            return self.exchange(cmd);
        }

        self.port
            .set_timeout(Duration::from_millis(ERASE_TIMEOUT_MS))
            .map_err(|e| IsspError::Transport(format!("failed to set timeout: {e}")))?;
        let result = self.send(cmd).and_then(|()| self.receive());
        let _ = self.port.set_timeout(self.timeout);
        result
    }
}
