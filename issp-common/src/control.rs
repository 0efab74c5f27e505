// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Textual control requests: manual resets, deferred recovery and raw line access.

use core::fmt;
use core::str::FromStr;

use tracing::warn;

use crate::error::{IsspError, Result};
use crate::recovery::{RecoveryCoordinator, RecoveryRequest};
use crate::transport::{Level, Line};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `reset`: pulse the microcontroller reset line.
    Reset,
    /// `usbreset`: reset the microcontroller and cycle the USB device.
    UsbReset,
    /// `recover`: queue a deferred recovery.
    Recover,
    /// `data <v>` / `clk <v>`: drive a line. Values other than 0 and 1 are ignored.
    SetLine(Line, u32),
    /// `data` / `clk`: read a line.
    ShowLine(Line),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    Done,
    Recovery(RecoveryRequest),
    Level(Level),
    /// The request was understood but had no effect.
    Ignored,
}

impl fmt::Display for ControlReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlReply::Done => f.write_str("ok"),
            ControlReply::Recovery(req) => write!(f, "{req:?}"),
            ControlReply::Level(level) => write!(f, "{}", u8::from(*level)),
            ControlReply::Ignored => f.write_str("ignored"),
        }
    }
}

fn parse_line(name: &str) -> Option<Line> {
    match name {
        "data" => Some(Line::Data),
        "clk" => Some(Line::Clock),
        _ => None,
    }
}

impl FromStr for ControlCommand {
    type Err = IsspError;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| IsspError::UnknownControl("empty request".into()))?;
        let arg = words.next();
        if words.next().is_some() {
            return Err(IsspError::UnknownControl(s.trim().to_string()));
        }

        match (name, arg) {
            ("reset", None) => Ok(ControlCommand::Reset),
            ("usbreset", None) => Ok(ControlCommand::UsbReset),
            ("recover", None) => Ok(ControlCommand::Recover),
            (line, None) => parse_line(line)
                .map(ControlCommand::ShowLine)
                .ok_or_else(|| IsspError::UnknownControl(s.trim().to_string())),
            (line, Some(value)) => {
                let line = parse_line(line)
                    .ok_or_else(|| IsspError::UnknownControl(s.trim().to_string()))?;
                let value = value.parse::<u32>().map_err(|_| {
                    IsspError::UnknownControl(format!("bad line level {value:?}"))
                })?;
                Ok(ControlCommand::SetLine(line, value))
            }
        }
    }
}

impl ControlCommand {
    /// Execute the request against the recovery coordinator.
    pub fn dispatch(self, coordinator: &RecoveryCoordinator) -> Result<ControlReply> {
        match self {
            ControlCommand::Reset => coordinator.reset().map(|()| ControlReply::Done),
            ControlCommand::UsbReset => coordinator
                .reset_with_dependent()
                .map(|()| ControlReply::Done),
            ControlCommand::Recover => Ok(ControlReply::Recovery(coordinator.request_recovery())),
            ControlCommand::SetLine(line, value) => {
                let Some(level) = u8::try_from(value)
                    .ok()
                    .and_then(|v| Level::try_from(v).ok())
                else {
                    warn!(?line, value, "ignoring line level, expected 0 or 1");
                    return Ok(ControlReply::Ignored);
                };
                coordinator.set_line(line, level)?;
                Ok(ControlReply::Done)
            }
            ControlCommand::ShowLine(line) => coordinator.line_level(line).map(ControlReply::Level),
        }
    }
}
