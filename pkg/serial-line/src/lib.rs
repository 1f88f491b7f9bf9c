#![doc = include_str!("../README.md")]
#![allow(
	// I dislike this rule... We import things elsewhere, usually outside of
  // modules themselves.
	clippy::module_name_repetitions,
)]

pub mod config;
pub mod errors;
mod sys;

pub use crate::config::Config;
use crate::errors::SerialError;
use std::path::Path;

pub use crate::sys::*;

/// The contract every serial port backend provides.
///
/// ## Lifecycle
///
/// A port is opened with [`Serial::open`] (or [`open`]), used, and finally
/// closed with [`Serial::close`] (or just dropped). Every operation other
/// than `close` fails with [`SerialError::PortClosed`] once closed.
///
/// ## Concurrency
///
/// `read`, `write`, and the discard functions take `&self`, so one reader
/// and one writer can share a port across threads. On Windows reads are
/// serialized behind one lock, and writes behind another. On POSIX the
/// kernel serializes access to the descriptor. Reconfiguring, and closing
/// take `&mut self`, which means they can never race a transfer.
///
/// There is no way to cancel a blocked read other than its timeout.
pub trait Serial {
	/// Open a serial port and commit `config` to it.
	///
	/// On POSIX `name` is a path to a TTY device. On Windows it is the name of
	/// a COM device (`COM1`, `COM12`, ...); the win32 device namespace prefix
	/// is added automatically when the name doesn't already start with `\`.
	///
	/// Nothing is left open if this fails.
	///
	/// ## Errors
	///
	/// - If the device cannot be opened, or locked for exclusive access.
	/// - If `config` cannot be expressed on this platform.
	/// - If the driver rejects the resulting native configuration.
	fn open(name: &Path, config: Config) -> Result<Self, SerialError>
	where
		Self: Sized;

	/// Read bytes from the serial port, blocking according to the timeouts of
	/// the committed configuration.
	///
	/// A return value of zero means no data arrived within the timeout.
	///
	/// ## Errors
	///
	/// If the port is closed, or the OS reports an error.
	fn read(&self, buff: &mut [u8]) -> Result<usize, SerialError>;

	/// Write bytes to the serial port.
	///
	/// ## Errors
	///
	/// If the port is closed, or the OS reports an error.
	fn write(&self, buff: &[u8]) -> Result<usize, SerialError>;

	/// Throw away any data received by the OS that hasn't been read yet.
	///
	/// ## Errors
	///
	/// If the port is closed, or the OS reports an error.
	fn discard_input(&self) -> Result<(), SerialError>;

	/// Throw away any data written that the OS hasn't transmitted yet.
	///
	/// ## Errors
	///
	/// If the port is closed, or the OS reports an error.
	fn discard_output(&self) -> Result<(), SerialError>;

	/// Release the OS resource.
	///
	/// Closing an already closed port is not an error.
	///
	/// ## Errors
	///
	/// If the OS fails to release the handle for any reason other than it
	/// being closed already.
	fn close(&mut self) -> Result<(), SerialError>;

	/// Translate `config` into the native control block held by this port.
	///
	/// This only stages the new configuration, call [`Serial::reapply`] to
	/// hand it to the OS (or use [`Serial::apply`] to do both). If any field
	/// cannot be translated the held block is left exactly as it was.
	///
	/// ## Errors
	///
	/// - If the port is closed.
	/// - If any field of `config` is unsupported on this platform.
	fn set_config(&mut self, config: Config) -> Result<(), SerialError>;

	/// Commit the currently held native control block to the OS again.
	///
	/// Nothing is re-derived from a [`Config`], this pushes exactly the block
	/// that was last staged. Useful for recovering a device after something
	/// else reconfigured it underneath us.
	///
	/// ## Errors
	///
	/// If the port is closed, or the driver rejects the block.
	fn reapply(&mut self) -> Result<(), SerialError>;

	/// The configuration the held native control block was last translated
	/// from.
	fn config(&self) -> Config;

	/// Stage a new configuration, and commit it immediately.
	///
	/// ## Errors
	///
	/// Any error from [`Serial::set_config`], or [`Serial::reapply`].
	fn apply(&mut self, config: Config) -> Result<(), SerialError> {
		self.set_config(config)?;
		self.reapply()
	}
}

/// Open a serial port with the backend for this platform.
///
/// See [`Serial::open`].
///
/// ## Errors
///
/// See [`Serial::open`].
pub fn open(name: impl AsRef<Path>, config: Config) -> Result<Port, SerialError> {
	Port::open(name.as_ref(), config)
}
