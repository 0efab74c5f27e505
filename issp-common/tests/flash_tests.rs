// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the attach-time flash flow.

mod common;

use common::{
    encode_records, standard_image, standard_records, test_config, Call, CallLog, MockTransport,
    VersionRead,
};
use issp_common::flash::{self, FlashOutcome};
use issp_common::{FirmwareImage, IsspError};

fn run_flash(transport: &mut MockTransport, firmware: Vec<u8>, force: bool) -> FlashOutcome {
    let mut config = test_config();
    config.force_update = force;
    let image = FirmwareImage::parse(firmware).unwrap();
    flash::run(image, &config, transport)
}

fn version_read() -> Call {
    Call::ReadBlock {
        block: 0,
        offset: 0x10,
        len: 1,
    }
}

// =============================================================================
// Decision outcomes
// =============================================================================

#[test]
fn test_flash_up_to_date_is_unchanged() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Byte(0x07));

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(matches!(outcome, FlashOutcome::Unchanged));
    assert_eq!(
        log.calls(),
        vec![Call::SiliconId, version_read(), Call::Run, Call::ReleaseLines]
    );
}

#[test]
fn test_flash_older_device_is_updated() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Byte(0x05));

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(matches!(outcome, FlashOutcome::Updated));
    assert_eq!(
        log.calls(),
        vec![
            Call::SiliconId,
            version_read(),
            Call::Program,
            Call::Run,
            Call::ReleaseLines
        ]
    );
}

#[test]
fn test_flash_newer_device_kept_without_force() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Byte(0x09));

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(matches!(outcome, FlashOutcome::Unchanged));
    assert_eq!(log.count(&Call::Program), 0);
}

#[test]
fn test_flash_newer_device_downgraded_with_force() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Byte(0x09));

    let outcome = run_flash(&mut transport, standard_image(0x07), true);
    assert!(matches!(outcome, FlashOutcome::Updated));
    assert_eq!(log.count(&Call::Program), 1);
}

#[test]
fn test_flash_protected_version_block_forces_update() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Protected);

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(matches!(outcome, FlashOutcome::Updated));
    assert_eq!(log.count(&Call::Program), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_flash_invalid_image_touches_nothing_but_restart() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone());

    let mut records = standard_records(0x07);
    records.remove(3);
    let outcome = run_flash(&mut transport, encode_records(&records), false);

    assert!(matches!(
        outcome.error(),
        Some(IsspError::InvalidImage(_))
    ));
    assert_eq!(log.calls(), vec![Call::Run, Call::ReleaseLines]);
}

#[test]
fn test_flash_identity_mismatch_never_programs() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone())
        .with_silicon_id([0xDE, 0xAD, 0xBE, 0xEF])
        .with_version(VersionRead::Byte(0x00));

    let outcome = run_flash(&mut transport, standard_image(0x07), true);
    match outcome {
        FlashOutcome::Failed(IsspError::IdentityMismatch { expected, actual }) => {
            assert_eq!(expected, common::SILICON_ID);
            assert_eq!(actual, [0xDE, 0xAD, 0xBE, 0xEF]);
        }
        other => panic!("expected identity mismatch, got {:?}", other),
    }
    assert_eq!(log.calls(), vec![Call::SiliconId, Call::Run, Call::ReleaseLines]);
}

#[test]
fn test_flash_version_read_error_fails() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone()).with_version(VersionRead::Fail);

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(matches!(outcome.error(), Some(IsspError::Transport(_))));
    assert_eq!(log.count(&Call::Program), 0);
    assert_eq!(log.count(&Call::Run), 1);
}

#[test]
fn test_flash_program_failure_still_restarts() {
    let log = CallLog::new();
    let mut transport = MockTransport::new(log.clone())
        .with_version(VersionRead::Byte(0x05))
        .failing_program("verify failed at block 2");

    let outcome = run_flash(&mut transport, standard_image(0x07), false);
    assert!(outcome.is_failed());
    match outcome.error() {
        Some(IsspError::Program(reason)) => assert!(reason.contains("block 2")),
        other => panic!("expected program error, got {:?}", other),
    }
    let calls = log.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::Run, Call::ReleaseLines]);
}

#[test]
fn test_flash_outcome_accessors() {
    assert!(!FlashOutcome::Updated.is_failed());
    assert!(FlashOutcome::Unchanged.error().is_none());
    let failed = FlashOutcome::Failed(IsspError::Program("x".into()));
    assert!(failed.is_failed());
    assert!(!failed.error().unwrap().is_fatal_to_attach());
}
