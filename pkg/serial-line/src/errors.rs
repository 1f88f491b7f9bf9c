//! A container for all the types of errors generated crate-wide.
//!
//! The top level error type is: [`SerialError`], which wraps all the other
//! types of errors. You can find more specific error types documented on each
//! specific item.

use miette::Diagnostic;
use std::{
	io::{Error as IoError, ErrorKind as IoErrorKind},
	path::PathBuf,
};
use thiserror::Error;

/// The 'top-level' error type for this entire crate, all error types
/// wrap underneath this.
#[derive(Error, Diagnostic, Debug)]
pub enum SerialError {
	/// See [`ConfigError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Config(#[from] ConfigError),
	/// See [`ResourceError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Resource(#[from] ResourceError),
	/// See [`ProfileError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Profile(#[from] ProfileError),
	/// The OS refused to hand us bytes from the serial port.
	#[error("Failed reading from the serial port: {0}")]
	#[diagnostic(code(serial_line::io::read_failure))]
	ReadFailure(#[source] IoError),
	/// The OS refused to take bytes for the serial port.
	#[error("Failed writing to the serial port: {0}")]
	#[diagnostic(code(serial_line::io::write_failure))]
	WriteFailure(#[source] IoError),
	/// We could not purge the queued data in one direction of the port.
	#[error("Failed to discard the {direction} queue of the serial port: {source}")]
	#[diagnostic(code(serial_line::io::discard_failure))]
	DiscardFailure {
		/// Either `input`, or `output`.
		direction: &'static str,
		#[source]
		source: IoError,
	},
	/// Releasing the OS handle failed for some reason other than it already
	/// being closed.
	#[error("Failed to close the serial port: {0}")]
	#[diagnostic(code(serial_line::io::close_failure))]
	CloseFailure(#[source] IoError),
	/// Something tried to use a port after [`crate::Serial::close`] was
	/// called on it.
	#[error("The serial port has already been closed.")]
	#[diagnostic(code(serial_line::io::port_closed))]
	PortClosed,
}

/// Hand the OS error back untouched where there is one, so that the
/// [`std::io::Read`], and [`std::io::Write`] impls behave like any other file.
impl From<SerialError> for IoError {
	fn from(value: SerialError) -> Self {
		match value {
			SerialError::ReadFailure(cause)
			| SerialError::WriteFailure(cause)
			| SerialError::CloseFailure(cause) => cause,
			SerialError::DiscardFailure { source, .. } => source,
			SerialError::PortClosed => IoError::new(IoErrorKind::NotConnected, value),
			other => IoError::other(other),
		}
	}
}

/// A [`crate::Config`] asked for something this platform cannot express.
///
/// These are always detected before anything is handed to the OS, and the
/// port keeps whatever configuration it held before the failing call.
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
	/// The baud rate is not in the platform's table of symbolic speeds.
	///
	/// There is no rounding to a nearby rate.
	#[error("Unrecognized baud rate: {0}, this platform has no native speed code for it.")]
	#[diagnostic(code(serial_line::config::unrecognized_baud_rate))]
	UnrecognizedBaudRate(u32),
	/// Data bits must be one of 0 (meaning 8), 5, 6, 7, or 8.
	#[error("Unsupported serial data size: {0}, must be 0, 5, 6, 7, or 8.")]
	#[diagnostic(code(serial_line::config::unsupported_data_size))]
	UnsupportedDataSize(u8),
	/// The stop bit code is not accepted on this platform.
	#[error("Unsupported stop bit setting: {0}")]
	#[diagnostic(code(serial_line::config::unsupported_stop_bits))]
	UnsupportedStopBits(u8),
	/// The parity code is not accepted on this platform.
	///
	/// Mark (`M`), and space (`S`) parity only exist on Windows.
	#[error("Unsupported parity setting: {0:#04x} ({})", parity_as_char(.0))]
	#[diagnostic(code(serial_line::config::unsupported_parity))]
	UnsupportedParity(u8),
}

/// Acquiring, querying, or committing state to the OS resource failed.
#[derive(Error, Diagnostic, Debug)]
pub enum ResourceError {
	/// We could not open (or lock) the serial device.
	#[error("Failed to open the serial device at `{}`: {source}", .path.display())]
	#[diagnostic(code(serial_line::resource::open_failure))]
	OpenFailure {
		/// The path we tried to open, after any OS specific prefixing.
		path: PathBuf,
		#[source]
		source: IoError,
	},
	/// Asking the driver for its current state failed.
	#[error("Failed to query the current state of the serial device: {0}")]
	#[diagnostic(code(serial_line::resource::query_failure))]
	QueryFailure(#[source] IoError),
	/// Handing the native control block to the driver failed.
	#[error("Failed to commit the line configuration to the serial device: {0}")]
	#[diagnostic(code(serial_line::resource::commit_failure))]
	CommitFailure(#[source] IoError),
	/// The system library holding the COMM entry points could not be loaded,
	/// or was missing one of them.
	#[error("Failed to load the `{symbol}` entry point from the system COMM driver library: {source}")]
	#[diagnostic(code(serial_line::resource::driver_load_failure))]
	DriverLoadFailure {
		/// The library, or symbol name that could not be resolved.
		symbol: &'static str,
		#[source]
		source: IoError,
	},
}

/// Loading a [`crate::Config`] from an INI profile failed.
#[derive(Error, Diagnostic, Debug)]
pub enum ProfileError {
	/// We could not read the profile from the filesystem.
	#[error("Failed to read the serial profile at `{}`: {source}", .path.display())]
	#[diagnostic(code(serial_line::profile::cannot_read))]
	CannotRead {
		path: PathBuf,
		#[source]
		source: IoError,
	},
	/// The data was not a valid INI document.
	#[error("Data for the serial profile was expected to be a valid INI file: {0}")]
	#[diagnostic(code(serial_line::profile::expected_ini))]
	InvalidIni(String),
	/// The requested section does not exist, or has no `baud` key.
	#[error("The serial profile has no section `{0}` with a `baud` key.")]
	#[diagnostic(code(serial_line::profile::missing_section))]
	MissingSection(String),
	/// A key had a value we could not parse.
	#[error("The serial profile key `{0}` has an unparsable value: `{1}`")]
	#[diagnostic(code(serial_line::profile::invalid_value))]
	InvalidValue(&'static str, String),
}

/// Render a parity code the way a user would have typed it.
fn parity_as_char(code: &u8) -> char {
	char::from(*code)
}
