// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image validation: one pass over the records collecting the four facts a
//! usable ISSP image must provide.

use core::fmt;

use crate::config::ImageLayout;
use crate::error::{IsspError, Result};
use crate::record::{FirmwareImage, ReadCursor, Record, RecordIndex};

/// Set of image facts, used both for progress during the scan and to report
/// what is missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FactSet(u8);

impl FactSet {
    pub const NONE: FactSet = FactSet(0);
    /// A record ends exactly at the end of the flash.
    pub const TOTAL_SIZE: FactSet = FactSet(1 << 0);
    pub const SECURITY: FactSet = FactSet(1 << 1);
    pub const CHECKSUM: FactSet = FactSet(1 << 2);
    pub const VERSION: FactSet = FactSet(1 << 3);
    pub const ALL: FactSet = FactSet(0b1111);

    const NAMES: [(FactSet, &'static str); 4] = [
        (FactSet::TOTAL_SIZE, "total-size marker"),
        (FactSet::SECURITY, "security record"),
        (FactSet::CHECKSUM, "checksum record"),
        (FactSet::VERSION, "version byte"),
    ];

    pub fn contains(self, other: FactSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FactSet) {
        self.0 |= other.0;
    }

    pub fn is_complete(self) -> bool {
        self.contains(FactSet::ALL)
    }

    /// Facts from [`FactSet::ALL`] not in `self`.
    pub fn missing(self) -> FactSet {
        FactSet(FactSet::ALL.0 & !self.0)
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (fact, name) in FactSet::NAMES {
            if self.contains(fact) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("nothing")?;
        }
        Ok(())
    }
}

/// Facts extracted from a valid image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageFacts {
    pub total_size_confirmed: bool,
    /// Index of the record at the security address.
    pub security_record: RecordIndex,
    /// Big-endian checksum from the first two bytes of the checksum record.
    pub checksum: u16,
    /// Firmware version byte.
    pub version: u8,
}

/// Scan `image` for the facts described by `layout`.
///
/// Each fact is taken from the first record that satisfies it. The scan stops
/// as soon as all four are known. If any fact is missing the whole image is
/// rejected.
pub fn validate(image: &FirmwareImage, layout: &ImageLayout) -> Result<ImageFacts> {
    let mut found = FactSet::NONE;
    let mut security_record = RecordIndex(0);
    let mut checksum = 0u16;
    let mut version = 0u8;

    for (index, rec) in image.records() {
        if !found.contains(FactSet::TOTAL_SIZE) && rec.end() == u64::from(layout.expected_size) {
            found.insert(FactSet::TOTAL_SIZE);
        }

        if !found.contains(FactSet::SECURITY) && rec.address == layout.security_addr {
            security_record = index;
            found.insert(FactSet::SECURITY);
        }

        if !found.contains(FactSet::CHECKSUM) && rec.address == layout.checksum_addr {
            if let [hi, lo, ..] = *rec.payload {
                checksum = u16::from_be_bytes([hi, lo]);
                found.insert(FactSet::CHECKSUM);
            }
        }

        if !found.contains(FactSet::VERSION) {
            if let Some(byte) = version_byte(&rec, layout.version_addr) {
                version = byte;
                found.insert(FactSet::VERSION);
            }
        }

        if found.is_complete() {
            break;
        }
    }

    if !found.is_complete() {
        return Err(IsspError::InvalidImage(found.missing()));
    }

    Ok(ImageFacts {
        total_size_confirmed: true,
        security_record,
        checksum,
        version,
    })
}

// The version address must lie strictly after the record start.
fn version_byte(rec: &Record<'_>, version_addr: u32) -> Option<u8> {
    if version_addr > rec.address && u64::from(version_addr) < rec.end() {
        let offset = (version_addr - rec.address) as usize;
        rec.payload.get(offset).copied()
    } else {
        None
    }
}

/// A firmware image that passed validation, with its facts.
#[derive(Clone, Debug)]
pub struct ValidatedImage {
    image: FirmwareImage,
    facts: ImageFacts,
}

impl ValidatedImage {
    pub fn new(image: FirmwareImage, layout: &ImageLayout) -> Result<Self> {
        let facts = validate(&image, layout)?;
        Ok(Self { image, facts })
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    pub fn facts(&self) -> &ImageFacts {
        &self.facts
    }

    pub fn version(&self) -> u8 {
        self.facts.version
    }

    /// The security record. Always present on a validated image.
    pub fn security_record(&self) -> Option<Record<'_>> {
        self.image.record(self.facts.security_record)
    }

    /// Cursor at the start of the security record.
    pub fn security_cursor(&self) -> ReadCursor<'_> {
        self.image.seek(self.facts.security_record)
    }
}
