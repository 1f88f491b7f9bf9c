//! The portable description of how a serial line should be driven.
//!
//! A [`Config`] is plain data. Nothing in here knows about termios, or DCBs,
//! each backend under `sys` translates it (and validates it) when it is
//! handed to [`crate::Serial::set_config`], or [`crate::open`].

use crate::errors::ProfileError;
use configparser::ini::Ini;
use std::{path::Path, time::Duration};

/// Zero value for data bits, treated exactly like [`DATA_BITS_8`].
pub const DATA_BITS_DEFAULT: u8 = 0;
/// Five data bits per frame.
pub const DATA_BITS_5: u8 = 5;
/// Six data bits per frame.
pub const DATA_BITS_6: u8 = 6;
/// Seven data bits per frame.
pub const DATA_BITS_7: u8 = 7;
/// Eight data bits per frame.
pub const DATA_BITS_8: u8 = 8;

/// Zero value for stop bits, one stop bit on every platform.
pub const STOP_BITS_DEFAULT: u8 = 0;
/// On POSIX one stop bit. On Windows this selects the driver's
/// one-and-a-half stop bit code, see the Windows backend for details.
pub const STOP_BITS_ONE: u8 = 1;
/// Two stop bits.
pub const STOP_BITS_TWO: u8 = 2;
/// Windows only convenience that lands on the driver's one stop bit code.
pub const STOP_BITS_HALF: u8 = 15;

/// Zero value for parity, treated exactly like [`PARITY_NONE`].
pub const PARITY_DEFAULT: u8 = 0;
/// No parity bit.
pub const PARITY_NONE: u8 = b'N';
/// Odd parity.
pub const PARITY_ODD: u8 = b'O';
/// Even parity.
pub const PARITY_EVEN: u8 = b'E';
/// Mark parity (parity bit always 1). Windows only.
pub const PARITY_MARK: u8 = b'M';
/// Space parity (parity bit always 0). Windows only.
pub const PARITY_SPACE: u8 = b'S';

/// Everything a caller can ask of a serial line.
///
/// Every field's zero value is an alias for the common case, so
/// `Config { baud: 9600, ..Default::default() }` is a 9600 8-N-1 line whose
/// reads never block.
///
/// ## Read timeouts
///
/// [`Config::min_bytes`] and [`Config::read_timeout`] are interpreted
/// differently per platform:
///
/// - POSIX maps them onto `VMIN` and `VTIME`. The timeout is converted to
///   deciseconds and clamped into `1..=255`, a literal zero timeout is kept
///   as zero. With `min_bytes > 0` the timer is an inter-byte idle timer.
/// - Windows ignores `min_bytes`. The timeout becomes one per-call total
///   timeout in milliseconds clamped into `1..=u32::MAX`, no matter how many
///   bytes have already arrived. That is a coarser model than POSIX, a read
///   may return after the first few bytes even if more were requested.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct Config {
	/// Bits per second, must be a rate the platform knows about.
	pub baud: u32,
	/// One of the `DATA_BITS_*` constants.
	pub data_bits: u8,
	/// One of the `PARITY_*` constants.
	pub parity: u8,
	/// One of the `STOP_BITS_*` constants.
	pub stop_bits: u8,
	/// Minimum number of bytes a read waits for (POSIX only).
	pub min_bytes: u8,
	/// Upper bound on how long a read waits.
	pub read_timeout: Duration,
}

impl Config {
	/// An explicit 8-N-1 configuration at a particular baud rate, with reads
	/// that return immediately.
	///
	/// Stop bits use [`STOP_BITS_DEFAULT`], the only code that means one stop
	/// bit on every platform.
	#[must_use]
	pub const fn new(baud: u32) -> Self {
		Self {
			baud,
			data_bits: DATA_BITS_8,
			parity: PARITY_NONE,
			stop_bits: STOP_BITS_DEFAULT,
			min_bytes: 0,
			read_timeout: Duration::ZERO,
		}
	}

	/// Set how reads block, see the type level docs for what these mean on
	/// each platform.
	#[must_use]
	pub const fn with_read_timeout(mut self, min_bytes: u8, read_timeout: Duration) -> Self {
		self.min_bytes = min_bytes;
		self.read_timeout = read_timeout;
		self
	}

	/// Load a configuration from a section of an INI file.
	///
	/// See [`Config::from_ini_str`] for the recognized keys.
	///
	/// ## Errors
	///
	/// - If we cannot read the file.
	/// - Any error from [`Config::from_ini_str`].
	pub fn from_ini_file(path: impl AsRef<Path>, section: &str) -> Result<Self, ProfileError> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path).map_err(|source| ProfileError::CannotRead {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_ini_str(contents, section)
	}

	/// Load a configuration from a section of INI formatted text.
	///
	/// Keys (all but `baud` are optional, and default to their zero value):
	///
	/// - `baud`: bits per second.
	/// - `data_bits`: `0`, `5`, `6`, `7`, or `8`.
	/// - `parity`: a single letter (`N`, `O`, `E`, `M`, `S`), or one of
	///   `none`, `odd`, `even`, `mark`, `space`.
	/// - `stop_bits`: `0`, `1`, `2`, `15`, or `1.5` (same as `15`).
	/// - `min_bytes`: `0` through `255`.
	/// - `read_timeout_ms`: milliseconds.
	///
	/// Values are only parsed here, whether the platform can actually honor
	/// them is checked when the config is applied to a port.
	///
	/// ## Errors
	///
	/// - If the text is not valid INI.
	/// - If the section, or its `baud` key is missing.
	/// - If a value cannot be parsed.
	pub fn from_ini_str(contents: impl Into<String>, section: &str) -> Result<Self, ProfileError> {
		let mut ini = Ini::new();
		ini.read(contents.into())
			.map_err(|ini_error| ProfileError::InvalidIni(format!("{ini_error:?}")))?;

		let Some(baud) = ini.get(section, "baud") else {
			return Err(ProfileError::MissingSection(section.to_owned()));
		};
		let mut config = Self {
			baud: parse_number("baud", &baud)?,
			..Default::default()
		};

		if let Some(value) = ini.get(section, "data_bits") {
			config.data_bits = parse_number("data_bits", &value)?;
		}
		if let Some(value) = ini.get(section, "parity") {
			config.parity = parse_parity(&value)?;
		}
		if let Some(value) = ini.get(section, "stop_bits") {
			config.stop_bits = parse_stop_bits(&value)?;
		}
		if let Some(value) = ini.get(section, "min_bytes") {
			config.min_bytes = parse_number("min_bytes", &value)?;
		}
		if let Some(value) = ini.get(section, "read_timeout_ms") {
			config.read_timeout = Duration::from_millis(parse_number("read_timeout_ms", &value)?);
		}

		Ok(config)
	}
}

fn parse_number<NumTy: std::str::FromStr>(
	key: &'static str,
	value: &str,
) -> Result<NumTy, ProfileError> {
	value
		.parse::<NumTy>()
		.map_err(|_| ProfileError::InvalidValue(key, value.to_owned()))
}

/// Parse a parity setting the way a user would write it.
///
/// ## Errors
///
/// If `value` is neither a known name, nor a single letter.
pub fn parse_parity(value: &str) -> Result<u8, ProfileError> {
	match value.to_ascii_lowercase().as_str() {
		"0" => Ok(PARITY_DEFAULT),
		"none" => Ok(PARITY_NONE),
		"odd" => Ok(PARITY_ODD),
		"even" => Ok(PARITY_EVEN),
		"mark" => Ok(PARITY_MARK),
		"space" => Ok(PARITY_SPACE),
		_ => match value.as_bytes() {
			// Unknown letters are passed through, the backend decides.
			[letter] if letter.is_ascii_alphabetic() => Ok(letter.to_ascii_uppercase()),
			_ => Err(ProfileError::InvalidValue("parity", value.to_owned())),
		},
	}
}

/// Parse a stop bit setting, `1.5` being accepted as [`STOP_BITS_HALF`].
///
/// ## Errors
///
/// If `value` is not a number that fits in a byte.
pub fn parse_stop_bits(value: &str) -> Result<u8, ProfileError> {
	if value == "1.5" {
		Ok(STOP_BITS_HALF)
	} else {
		parse_number("stop_bits", value)
	}
}
