// SPDX-License-Identifier: MIT

use std::fs::File;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};

use spi_reader::mapper::DevMem;
use spi_reader::pci::SysfsBus;
use spi_reader::{dump, ReadRequest, CATALOG};

#[derive(Parser)]
#[command(name = "spi-reader")]
#[command(about = "Dump SPI flash through the PCH hardware sequencing registers (read-only)")]
struct Args {
    /// Output file for the dumped bytes
    #[arg(short, long)]
    output: PathBuf,

    /// Flash offset to start reading from (decimal, 0x hex, or K/M/G suffix)
    #[arg(long, default_value = "0", value_parser = parse_size)]
    offset: u64,

    /// Total number of bytes to read
    #[arg(short, long, value_parser = parse_size)]
    size: u64,
}

fn parse_size(text: &str) -> Result<u64, String> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_err(|err| err.to_string());
    }

    let upper = text.to_uppercase();
    let (digits, multiplier) = if let Some(digits) = upper.strip_suffix('G') {
        (digits, 1024 * 1024 * 1024)
    } else if let Some(digits) = upper.strip_suffix('M') {
        (digits, 1024 * 1024)
    } else if let Some(digits) = upper.strip_suffix('K') {
        (digits, 1024)
    } else {
        (upper.as_str(), 1)
    };

    let value: u64 = digits.parse().map_err(|err| format!("{}", err))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("{} overflows", text))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.size == 0 {
        error!("--size must be non-zero");
        process::exit(1);
    }
    let Some(request) = ReadRequest::new(args.offset, args.size) else {
        error!("offset + size overflows");
        process::exit(1);
    };

    // Opened fresh, truncating any previous dump; closed on drop.
    let mut sink = match File::create(&args.output) {
        Ok(file) => file,
        Err(err) => {
            error!("cannot create {}: {}", args.output.display(), err);
            process::exit(1);
        }
    };

    let bus = SysfsBus;
    let mut mapper = DevMem;
    match dump(CATALOG, &bus, &mut mapper, &request, &mut sink) {
        Ok(written) => {
            info!("wrote {} bytes to {}", written, args.output.display());
        }
        Err(err) => {
            error!("dump failed: {}", err);
            process::exit(1);
        }
    }
}
