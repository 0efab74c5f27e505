// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Binary firmware record store.
//!
//! An image is a sequence of records, each laid out as:
//!
//! ```text
//! +--------------+-------------+------------------+---------+
//! | address (BE) | length (BE) | payload (length) | padding |
//! |   4 bytes    |   2 bytes   |                  | to 4    |
//! +--------------+-------------+------------------+---------+
//! ```
//!
//! Records start on 4-byte boundaries. A record with length 0 marks the end and
//! must be the last six bytes of the buffer.

use crate::error::{IsspError, Result};

/// Size of the address + length header.
pub const RECORD_HEADER_LEN: usize = 6;
const RECORD_ALIGN: usize = 4;

/// Position of a record in the image's stored order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordIndex(pub usize);

/// An addressed byte range borrowed from a [`FirmwareImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub address: u32,
    pub payload: &'a [u8],
}

impl Record<'_> {
    /// Payload length as stored in the record header.
    pub fn len(&self) -> u16 {
        // Payload slices are built from a u16 length field.
        self.payload.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// One past the last address covered, widened so it cannot wrap.
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.len())
    }
}

#[derive(Clone, Copy, Debug)]
struct RecordSpan {
    address: u32,
    start: usize,
    len: u16,
}

/// Immutable firmware buffer with its parsed record table.
#[derive(Clone, Debug)]
pub struct FirmwareImage {
    data: Vec<u8>,
    records: Vec<RecordSpan>,
}

fn align_up(n: usize) -> usize {
    (n + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

impl FirmwareImage {
    /// Parse a binary record image.
    ///
    /// Fails if a record runs past the end of the buffer or if the end marker
    /// is missing or not at the very end.
    pub fn parse(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        let mut records = Vec::new();
        let mut pos = 0usize;

        loop {
            let header = data
                .get(pos..pos + RECORD_HEADER_LEN)
                .ok_or_else(|| {
                    IsspError::MalformedImage(format!("truncated record header at offset {pos}"))
                })?;
            let address = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let len = u16::from_be_bytes([header[4], header[5]]);

            if len == 0 {
                if pos + RECORD_HEADER_LEN != data.len() {
                    return Err(IsspError::MalformedImage(format!(
                        "end marker at offset {pos} followed by {} trailing bytes",
                        data.len() - pos - RECORD_HEADER_LEN
                    )));
                }
                break;
            }

            let start = pos + RECORD_HEADER_LEN;
            if start + usize::from(len) > data.len() {
                return Err(IsspError::MalformedImage(format!(
                    "record at offset {pos} (address 0x{address:08x}) overruns the image by {} bytes",
                    start + usize::from(len) - data.len()
                )));
            }

            records.push(RecordSpan {
                address,
                start,
                len,
            });
            pos += align_up(RECORD_HEADER_LEN + usize::from(len));
        }

        Ok(Self { data, records })
    }

    /// Number of data records (the end marker is not counted).
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Raw image bytes, as loaded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn record(&self, index: RecordIndex) -> Option<Record<'_>> {
        self.records.get(index.0).map(|span| self.view(span))
    }

    /// Records in stored order.
    pub fn records(&self) -> impl Iterator<Item = (RecordIndex, Record<'_>)> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(i, span)| (RecordIndex(i), self.view(span)))
    }

    /// Cursor positioned at the first byte of the first record.
    pub fn rewind(&self) -> ReadCursor<'_> {
        self.seek(RecordIndex(0))
    }

    /// Cursor positioned at the first byte of `target`.
    pub fn seek(&self, target: RecordIndex) -> ReadCursor<'_> {
        ReadCursor {
            image: self,
            record: target.0,
            offset: 0,
        }
    }

    fn view(&self, span: &RecordSpan) -> Record<'_> {
        Record {
            address: span.address,
            payload: &self.data[span.start..span.start + usize::from(span.len)],
        }
    }
}

/// Sequential byte reader that crosses record boundaries.
///
/// The cursor does not know how many bytes the caller may legitimately read;
/// it yields `None` only once it has run off the last record.
#[derive(Clone, Debug)]
pub struct ReadCursor<'a> {
    image: &'a FirmwareImage,
    record: usize,
    offset: usize,
}

impl ReadCursor<'_> {
    /// Record the next byte will come from.
    pub fn record_index(&self) -> RecordIndex {
        RecordIndex(self.record)
    }

    /// Offset of the next byte within its record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the current byte and advance, moving to the next record at the end of this one.
    pub fn next_byte(&mut self) -> Option<u8> {
        let span = self.image.records.get(self.record)?;
        let byte = *self.image.data.get(span.start + self.offset)?;

        self.offset += 1;
        if self.offset >= usize::from(span.len) {
            self.record += 1;
            self.offset = 0;
        }

        Some(byte)
    }
}

impl Iterator for ReadCursor<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.next_byte()
    }
}
