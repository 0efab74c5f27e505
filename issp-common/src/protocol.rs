// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol between the host and the ISSP programming bridge.
//!
//! Frames are `postcard`-serialized and COBS-encoded, so 0x00 delimits frames
//! on the serial line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::{Level, Line, SiliconId};

/// Serial line rate of the bridge.
pub const BRIDGE_BAUD_RATE: u32 = 115_200;

/// Largest flash block the bridge accepts in a single write.
pub const MAX_BLOCK_SIZE: usize = 256;

/// Upper bound of an encoded frame, including COBS overhead.
pub const MAX_FRAME_SIZE: usize = 2048;

// --- Command / Response protocol ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pulse the target reset line.
    Reset,
    /// Leave programming mode.
    Run,
    /// Enter programming mode; answered with `SiliconId`.
    EnterProgramming,
    ReadBlock {
        block: u16,
        offset: u16,
        len: u16,
    },
    EraseAll,
    WriteBlock {
        block: u16,
        data: Vec<u8>,
    },
    WriteSecurity {
        data: Vec<u8>,
    },
    /// Answered with `Checksum`.
    ReadChecksum,
    SetLine {
        line: Line,
        level: Level,
    },
    /// Answered with `Level`.
    GetLine {
        line: Line,
    },
    ReleaseLines,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ack(AckStatus),
    SiliconId(SiliconId),
    Data(Vec<u8>),
    Checksum(u16),
    Level(Level),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Ok,
    /// The addressed block is protected.
    Protected,
    /// Write verification failed on the bridge.
    VerifyError,
    /// The target did not answer within the ISSP timeout.
    Timeout,
    BadCommand,
    BadState,
}

/// COBS-encode a frame, trailing delimiter included.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(postcard::to_stdvec_cobs(msg)?)
}

/// Decode a COBS frame (delimiter included) in place.
pub fn decode_frame<T: DeserializeOwned>(frame: &mut [u8]) -> Result<T> {
    Ok(postcard::from_bytes_cobs(frame)?)
}
