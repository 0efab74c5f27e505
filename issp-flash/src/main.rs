// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host tool to verify, re-flash and recover an ISSP microcontroller through
//! a serial programming bridge.
//!
//! Usage:
//!   issp-flash --config js.json check firmware.bin
//!   issp-flash --port /dev/ttyACM0 --config js.json flash firmware.bin
//!   issp-flash --port /dev/ttyACM0 --usb-device /sys/bus/usb/devices/1-1 reset --with-usb
//!   issp-flash --port /dev/ttyACM0 --config js.json monitor firmware.bin

mod cli;
mod commands;
mod platform;
mod transport;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);
    cli::run(args)
}
