// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use issp_common::Line;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "issp-flash")]
#[command(about = "Verify, re-flash and recover an ISSP microcontroller")]
pub struct Cli {
    /// Serial port of the programming bridge (e.g., /dev/ttyACM0)
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Device configuration (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Sysfs directory of the USB device behind the microcontroller
    #[arg(long, global = true)]
    pub usb_device: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a firmware image against the device configuration
    Check {
        /// Binary record firmware file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Update the microcontroller if its firmware is outdated
    Flash {
        /// Binary record firmware file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Reflash whenever versions differ, including downgrades
        #[arg(short, long)]
        force: bool,
    },

    /// Toggle the reset line of the microcontroller
    Reset {
        /// Also cycle the USB device behind it
        #[arg(long)]
        with_usb: bool,
    },

    /// Read or drive a programming line
    Line {
        #[arg(value_enum)]
        line: LineArg,

        /// Level to drive (0 or 1); omit to read
        level: Option<u32>,
    },

    /// Flash if needed, then serve control requests from stdin until EOF
    Monitor {
        /// Binary record firmware file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LineArg {
    Data,
    Clk,
}

impl From<LineArg> for Line {
    fn from(arg: LineArg) -> Line {
        match arg {
            LineArg::Data => Line::Data,
            LineArg::Clk => Line::Clock,
        }
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let target = commands::Target {
        port: cli.port,
        config: cli.config,
        usb_device: cli.usb_device,
    };

    match cli.command {
        Commands::Check { file } => commands::check(&target, &file),
        Commands::Flash { file, force } => commands::flash(&target, &file, force),
        Commands::Reset { with_usb } => commands::reset(&target, with_usb),
        Commands::Line { line, level } => commands::line(&target, line.into(), level),
        Commands::Monitor { file } => commands::monitor(&target, &file),
    }
}
