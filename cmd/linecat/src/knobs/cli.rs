//! Defines the command line interface a.k.a. all the arguments & flags.

use clap::Parser;
use serial_line::config::{parse_parity, parse_stop_bits};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about, author, name = "linecat", version)]
pub struct CliArguments {
	#[arg(
		index = 1,
		help = "The serial port to open.",
		long_help = "The serial port to open, on windows this is a device name like `COM1`, everywhere else a path like `/dev/ttyUSB0`. Conflicts with `--port`."
	)]
	pub port_positional: Option<PathBuf>,
	#[arg(
		short = 'p',
		long = "port",
		help = "The serial port to open as a flag.",
		long_help = "The serial port to open as a flag, conflicts with the positional argument."
	)]
	pub port_flag: Option<PathBuf>,
	#[arg(
		long = "profile",
		requires = "section",
		help = "Load the line configuration from an INI file.",
		long_help = "Load the line configuration from a section of an INI file (see `--section`). When set every other line configuration flag is ignored."
	)]
	pub profile: Option<PathBuf>,
	#[arg(
		long = "section",
		requires = "profile",
		help = "The section of the INI profile to use."
	)]
	pub section: Option<String>,
	#[arg(
		short = 'b',
		long = "baud",
		default_value_t = 115_200,
		help = "Bits per second."
	)]
	pub baud: u32,
	#[arg(
		long = "data-bits",
		default_value_t = 8,
		help = "Data bits per frame: 5, 6, 7, or 8."
	)]
	pub data_bits: u8,
	#[arg(
		long = "parity",
		default_value = "none",
		value_parser = parity_arg,
		help = "Parity: none, odd, even, mark, or space.",
		long_help = "Parity: none, odd, even, mark, or space (or their first letter). Mark, and space only work on windows."
	)]
	pub parity: u8,
	#[arg(
		long = "stop-bits",
		default_value = "0",
		value_parser = stop_bits_arg,
		help = "Stop bits: 0 (one everywhere), 1, 2, or 1.5.",
		long_help = "Stop bits: 0 means one stop bit on every platform. 2 is two stop bits. On windows 1 is one and a half stop bits (as is `1.5`), everywhere else 1 is one stop bit."
	)]
	pub stop_bits: u8,
	#[arg(
		long = "min-bytes",
		default_value_t = 0,
		help = "Minimum bytes a read waits for (ignored on windows)."
	)]
	pub min_bytes: u8,
	#[arg(
		long = "read-timeout-ms",
		default_value_t = 100,
		help = "How long a single read waits, in milliseconds.",
		long_help = "How long a single read waits, in milliseconds. Zero is only accepted together with a non-zero `--min-bytes`, otherwise reads would never wait."
	)]
	pub read_timeout_ms: u64,
	#[arg(
		long = "discard-input",
		help = "Throw away anything the OS already buffered before reading."
	)]
	pub discard_input: bool,
	#[arg(
		long = "hex",
		help = "Print received bytes as hex instead of raw."
	)]
	pub hex: bool,
	#[arg(
		short = 'j',
		long = "json",
		help = "Ensures all logging comes out in JSON instead of text.",
		long_help = "Switch all logging and output to JSON for machine parsable output. NOTE: there is no necissarily guaranteed structure, though we will not break it unnecissarily."
	)]
	pub json: bool,
}

fn parity_arg(value: &str) -> Result<u8, String> {
	parse_parity(value).map_err(|cause| cause.to_string())
}

fn stop_bits_arg(value: &str) -> Result<u8, String> {
	parse_stop_bits(value).map_err(|cause| cause.to_string())
}
