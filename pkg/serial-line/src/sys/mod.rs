//! Contains the per os raw implementations of a serial port.
//!
//! Each backend owns the OS handle, and the native control block that was
//! last translated from a [`crate::Config`]. Which one gets compiled is
//! decided purely by the target.

use crate::Serial;
use std::io::{Read, Result as IoResult, Write};

#[cfg(any(
	target_os = "dragonfly",
	target_os = "freebsd",
	target_os = "ios",
	target_os = "macos",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "linux",
	target_os = "android",
))]
mod unix;
#[cfg(any(
	target_os = "dragonfly",
	target_os = "freebsd",
	target_os = "ios",
	target_os = "macos",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "linux",
	target_os = "android",
))]
pub use unix::TtyPort;
/// The serial port type for the platform being compiled for.
#[cfg(any(
	target_os = "dragonfly",
	target_os = "freebsd",
	target_os = "ios",
	target_os = "macos",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "linux",
	target_os = "android",
))]
pub type Port = TtyPort;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use windows::ComPort;
/// The serial port type for the platform being compiled for.
#[cfg(target_os = "windows")]
pub type Port = ComPort;

impl Read for Port {
	fn read(&mut self, buff: &mut [u8]) -> IoResult<usize> {
		Ok(Serial::read(self, buff)?)
	}
}

impl Read for &'_ Port {
	fn read(&mut self, buff: &mut [u8]) -> IoResult<usize> {
		Ok(Serial::read(*self, buff)?)
	}
}

impl Write for Port {
	fn write(&mut self, buff: &[u8]) -> IoResult<usize> {
		Ok(Serial::write(self, buff)?)
	}

	// Writes are handed straight to the driver, there is nothing buffered
	// on our side.
	fn flush(&mut self) -> IoResult<()> {
		Ok(())
	}
}

impl Write for &'_ Port {
	fn write(&mut self, buff: &[u8]) -> IoResult<usize> {
		Ok(Serial::write(*self, buff)?)
	}

	fn flush(&mut self) -> IoResult<()> {
		Ok(())
	}
}
