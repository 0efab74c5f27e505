// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the update decision.

mod common;

use common::{Call, CallLog, MockTransport, VersionRead};
use issp_common::decision::{needs_update, version_location, version_policy};
use issp_common::IsspError;
use proptest::prelude::*;

// =============================================================================
// Policy
// =============================================================================

#[test]
fn test_policy_older_device_is_updated() {
    assert!(version_policy(0x05, 0x07, false));
}

#[test]
fn test_policy_same_version_is_kept() {
    assert!(!version_policy(0x07, 0x07, false));
    assert!(!version_policy(0x07, 0x07, true));
}

#[test]
fn test_policy_newer_device_needs_force() {
    assert!(!version_policy(0x09, 0x07, false));
    assert!(version_policy(0x09, 0x07, true));
}

proptest! {
    #[test]
    fn prop_older_device_always_updated(fw in 1u8..=255, force in any::<bool>()) {
        let device = fw - 1;
        prop_assert!(version_policy(device, fw, force));
    }

    #[test]
    fn prop_equal_versions_never_updated(v in any::<u8>(), force in any::<bool>()) {
        prop_assert!(!version_policy(v, v, force));
    }

    #[test]
    fn prop_force_covers_every_difference(device in any::<u8>(), fw in any::<u8>()) {
        prop_assert_eq!(version_policy(device, fw, true), device != fw);
    }

    #[test]
    fn prop_downgrade_only_with_force(fw in 0u8..255, force in any::<bool>()) {
        let device = fw + 1;
        prop_assert_eq!(version_policy(device, fw, force), force);
    }
}

// =============================================================================
// Version location
// =============================================================================

#[test]
fn test_version_location_splits_address() {
    assert_eq!(version_location(0x50, 64).unwrap(), (1, 0x10));
    assert_eq!(version_location(0x3F, 64).unwrap(), (0, 0x3F));
    assert_eq!(version_location(128, 64).unwrap(), (2, 0));
}

#[test]
fn test_version_location_zero_block_size() {
    let err = version_location(0x50, 0).unwrap_err();
    assert!(matches!(err, IsspError::InvalidConfig(_)));
}

#[test]
fn test_version_location_block_out_of_range() {
    let err = version_location(u32::MAX, 1).unwrap_err();
    assert!(matches!(err, IsspError::InvalidConfig(_)));
}

// =============================================================================
// needs_update against the transport
// =============================================================================

#[test]
fn test_needs_update_reads_one_byte_at_version_location() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Byte(0x05));

    assert!(needs_update(&mut transport, 0x50, 64, 0x07, false).unwrap());
    assert_eq!(
        log.calls(),
        vec![Call::ReadBlock {
            block: 1,
            offset: 0x10,
            len: 1
        }]
    );
}

#[test]
fn test_needs_update_same_version_forced() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log).with_version(VersionRead::Byte(0x07));
    assert!(!needs_update(&mut transport, 0x10, 64, 0x07, true).unwrap());
}

#[test]
fn test_needs_update_protected_block_forces_update() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log).with_version(VersionRead::Protected);
    assert!(needs_update(&mut transport, 0x10, 64, 0x07, false).unwrap());
}

#[test]
fn test_needs_update_read_error_propagates() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log).with_version(VersionRead::Fail);
    let err = needs_update(&mut transport, 0x10, 64, 0x07, false).unwrap_err();
    assert!(matches!(err, IsspError::Transport(_)));
}

#[test]
fn test_needs_update_bad_block_size_skips_read() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone());
    assert!(needs_update(&mut transport, 0x10, 0, 0x07, false).is_err());
    assert!(log.calls().is_empty());
}
