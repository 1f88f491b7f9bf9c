//! Win32 COMM ports, driven synchronously through a `DCB`, and
//! `COMMTIMEOUTS`.

mod driver;

use self::driver::CommDriver;
use crate::{
	config::{
		Config, DATA_BITS_5, DATA_BITS_6, DATA_BITS_7, DATA_BITS_8, DATA_BITS_DEFAULT,
		PARITY_DEFAULT, PARITY_EVEN, PARITY_MARK, PARITY_NONE, PARITY_ODD, PARITY_SPACE,
		STOP_BITS_DEFAULT, STOP_BITS_HALF, STOP_BITS_ONE, STOP_BITS_TWO,
	},
	errors::{ConfigError, ResourceError, SerialError},
	Serial,
};
use std::{
	fmt::{Debug, Formatter, Result as FmtResult},
	fs::{File, OpenOptions},
	io::Error as IoError,
	os::windows::{
		fs::OpenOptionsExt,
		io::{AsRawHandle, IntoRawHandle},
	},
	path::{Path, PathBuf},
	sync::{Mutex, PoisonError},
	time::Duration,
};
use tracing::{debug, trace, warn};
use windows::Win32::{
	Devices::Communication::{
		COMMTIMEOUTS, DCB, EVENPARITY, EV_RXCHAR, MARKPARITY, NOPARITY, ODDPARITY, ONE5STOPBITS,
		ONESTOPBIT, PURGE_RXABORT, PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR, SPACEPARITY,
		TWOSTOPBITS,
	},
	Foundation::{CloseHandle, ERROR_INVALID_HANDLE, ERROR_IO_PENDING, HANDLE},
	Storage::FileSystem::{ReadFile, WriteFile},
};

/// Size of both driver queues requested when committing.
const QUEUE_SIZE: u32 = 512;
/// `fBinary` is the lowest bit of the DCB bitfield, Windows only supports
/// binary transfers.
const DCB_BINARY_FLAG: u32 = 0x1;

/// A serial port backed by a Win32 file handle.
pub struct ComPort {
	/// `None` once the port has been closed.
	fd: Option<File>,
	/// The device control block as last staged by `set_config`.
	dcb: DCB,
	/// The timeouts staged alongside `dcb`.
	timeouts: COMMTIMEOUTS,
	/// The configuration `dcb`, and `timeouts` were translated from.
	config: Config,
	/// Held for the duration of every read.
	read_lock: Mutex<()>,
	/// Held for the duration of every write.
	write_lock: Mutex<()>,
	driver: &'static CommDriver,
}

impl ComPort {
	fn handle(&self) -> Result<HANDLE, SerialError> {
		self.fd
			.as_ref()
			.map(raw_handle)
			.ok_or(SerialError::PortClosed)
	}

	fn purge(&self, flags: u32, direction: &'static str) -> Result<(), SerialError> {
		let handle = self.handle()?;
		self.driver
			.purge_comm(handle, flags)
			.map_err(|source| SerialError::DiscardFailure { direction, source })
	}
}

impl Serial for ComPort {
	fn open(name: &Path, config: Config) -> Result<Self, SerialError> {
		let driver = CommDriver::get()?;
		let path = device_path(name);

		let fd = OpenOptions::new()
			.read(true)
			.write(true)
			.create(false)
			.share_mode(0)
			.open(&path)
			.map_err(|source| ResourceError::OpenFailure {
				path: path.clone(),
				source,
			})?;

		// Start from whatever the driver already has, so fields we don't manage
		// (flow control, special characters) keep their driver defaults.
		let mut dcb = DCB {
			DCBlength: dcb_length(),
			..Default::default()
		};
		driver
			.get_comm_state(raw_handle(&fd), &mut dcb)
			.map_err(ResourceError::QueryFailure)?;
		encode_frame(&mut dcb, &config)?;

		let mut this = Self {
			fd: Some(fd),
			dcb,
			timeouts: timeouts_from(config.read_timeout),
			config,
			read_lock: Mutex::new(()),
			write_lock: Mutex::new(()),
			driver,
		};
		this.reapply()?;

		debug!(
			path = %path.display(),
			baud = config.baud,
			data_bits = config.data_bits,
			parity = config.parity,
			stop_bits = config.stop_bits,
			read_timeout_ms = this.timeouts.ReadTotalTimeoutConstant,
			"opened com serial port",
		);
		Ok(this)
	}

	fn read(&self, buff: &mut [u8]) -> Result<usize, SerialError> {
		let handle = self.handle()?;
		let _guard = self.read_lock.lock().unwrap_or_else(PoisonError::into_inner);

		let mut read_bytes = 0_u32;
		match unsafe { ReadFile(handle, Some(buff), Some(&mut read_bytes), None) } {
			Ok(()) => {
				trace!(read = read_bytes, "com read");
				Ok(read_bytes as usize)
			}
			Err(_) => {
				let cause = IoError::last_os_error();
				if is_pending(&cause) {
					warn!("com read reported a pending operation, treating as zero bytes");
					Ok(0)
				} else {
					Err(SerialError::ReadFailure(cause))
				}
			}
		}
	}

	fn write(&self, buff: &[u8]) -> Result<usize, SerialError> {
		let handle = self.handle()?;
		let _guard = self
			.write_lock
			.lock()
			.unwrap_or_else(PoisonError::into_inner);

		let mut written = 0_u32;
		match unsafe { WriteFile(handle, Some(buff), Some(&mut written), None) } {
			Ok(()) => {
				trace!(requested = buff.len(), written, "com write");
				Ok(written as usize)
			}
			Err(_) => {
				let cause = IoError::last_os_error();
				if is_pending(&cause) {
					warn!("com write reported a pending operation, treating as zero bytes");
					Ok(0)
				} else {
					Err(SerialError::WriteFailure(cause))
				}
			}
		}
	}

	fn discard_input(&self) -> Result<(), SerialError> {
		self.purge(PURGE_RXCLEAR.0 | PURGE_RXABORT.0, "input")
	}

	fn discard_output(&self) -> Result<(), SerialError> {
		self.purge(PURGE_TXCLEAR.0 | PURGE_TXABORT.0, "output")
	}

	fn close(&mut self) -> Result<(), SerialError> {
		let Some(fd) = self.fd.take() else {
			return Ok(());
		};

		if unsafe { CloseHandle(HANDLE(fd.into_raw_handle() as isize)) }.is_err() {
			close_outcome(IoError::last_os_error())?;
		}

		debug!("closed com serial port");
		Ok(())
	}

	fn set_config(&mut self, config: Config) -> Result<(), SerialError> {
		self.handle()?;

		let mut staged = self.dcb;
		encode_frame(&mut staged, &config)?;
		self.dcb = staged;
		self.timeouts = timeouts_from(config.read_timeout);
		self.config = config;

		debug!(
			baud = config.baud,
			data_bits = config.data_bits,
			parity = config.parity,
			stop_bits = config.stop_bits,
			read_timeout_ms = self.timeouts.ReadTotalTimeoutConstant,
			"staged com configuration",
		);
		Ok(())
	}

	fn reapply(&mut self) -> Result<(), SerialError> {
		let handle = self.handle()?;
		self.driver
			.set_comm_state(handle, &self.dcb)
			.and_then(|()| self.driver.set_comm_timeouts(handle, &self.timeouts))
			.and_then(|()| self.driver.setup_comm(handle, QUEUE_SIZE, QUEUE_SIZE))
			.and_then(|()| self.driver.set_comm_mask(handle, EV_RXCHAR.0))
			.map_err(ResourceError::CommitFailure)?;

		debug!(baud = self.dcb.BaudRate, "committed com configuration");
		Ok(())
	}

	fn config(&self) -> Config {
		self.config
	}
}

impl Debug for ComPort {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
		fmt.debug_struct("ComPort")
			.field("fd", &self.fd)
			.field("baud", &self.dcb.BaudRate)
			.field("byte_size", &self.dcb.ByteSize)
			.field("parity", &self.dcb.Parity.0)
			.field("stop_bits", &self.dcb.StopBits.0)
			.field("read_timeout_ms", &self.timeouts.ReadTotalTimeoutConstant)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

#[allow(
	// Guaranteed to not truncate.
	clippy::cast_possible_truncation,
)]
const fn dcb_length() -> u32 {
	std::mem::size_of::<DCB>() as u32
}

fn raw_handle(fd: &File) -> HANDLE {
	HANDLE(fd.as_raw_handle() as isize)
}

#[allow(
	// Wrap is guaranteed to not happen in this error code.
	clippy::cast_possible_wrap,
)]
fn is_pending(cause: &IoError) -> bool {
	cause.raw_os_error() == Some(ERROR_IO_PENDING.0 as i32)
}

/// Decide what a failed `CloseHandle` means, a handle that is already
/// gone counts as closed.
#[allow(
	// Wrap is guaranteed to not happen in this error code.
	clippy::cast_possible_wrap,
)]
fn close_outcome(cause: IoError) -> Result<(), SerialError> {
	if cause.raw_os_error() == Some(ERROR_INVALID_HANDLE.0 as i32) {
		Ok(())
	} else {
		Err(SerialError::CloseFailure(cause))
	}
}

/// Put a device name in the win32 device namespace, otherwise we'd be
/// limited to COM1-9.
///
/// <https://docs.microsoft.com/en-us/windows/win32/fileio/naming-a-file#win32-device-namespaces>
fn device_path(name: &Path) -> PathBuf {
	if name.to_string_lossy().starts_with('\\') {
		name.to_path_buf()
	} else {
		let mut path = PathBuf::from(r"\\.");
		path.push(name);
		path
	}
}

/// Write baud, and frame fields into a `DCB`.
///
/// Baud is passed straight through, the driver validates it on commit.
/// Stop bits follow the driver's own numbering: `0`, and `15` land on
/// `ONESTOPBIT` (0), `1` on `ONE5STOPBITS` (1), and `2` on `TWOSTOPBITS`.
fn encode_frame(dcb: &mut DCB, config: &Config) -> Result<(), ConfigError> {
	let byte_size = match config.data_bits {
		DATA_BITS_DEFAULT | DATA_BITS_8 => DATA_BITS_8,
		bits @ (DATA_BITS_5 | DATA_BITS_6 | DATA_BITS_7) => bits,
		other => return Err(ConfigError::UnsupportedDataSize(other)),
	};

	let stop_bits = match config.stop_bits {
		STOP_BITS_DEFAULT | STOP_BITS_HALF => ONESTOPBIT,
		STOP_BITS_ONE => ONE5STOPBITS,
		STOP_BITS_TWO => TWOSTOPBITS,
		other => return Err(ConfigError::UnsupportedStopBits(other)),
	};

	let parity = match config.parity {
		PARITY_DEFAULT | PARITY_NONE => NOPARITY,
		PARITY_ODD => ODDPARITY,
		PARITY_EVEN => EVENPARITY,
		PARITY_MARK => MARKPARITY,
		PARITY_SPACE => SPACEPARITY,
		other => return Err(ConfigError::UnsupportedParity(other)),
	};

	dcb.DCBlength = dcb_length();
	dcb._bitfield |= DCB_BINARY_FLAG;
	dcb.BaudRate = config.baud;
	dcb.ByteSize = byte_size;
	dcb.StopBits = stop_bits;
	dcb.Parity = parity;
	Ok(())
}

/// One total timeout per read call.
///
/// With the interval, and multiplier both at `MAXDWORD` a read returns as
/// soon as any byte is buffered, or waits up to the constant for the first
/// one. Writes never time out.
fn timeouts_from(read_timeout: Duration) -> COMMTIMEOUTS {
	let constant = u32::try_from(read_timeout.as_millis())
		.unwrap_or(u32::MAX)
		.max(1);

	COMMTIMEOUTS {
		ReadIntervalTimeout: u32::MAX,
		ReadTotalTimeoutMultiplier: u32::MAX,
		ReadTotalTimeoutConstant: constant,
		WriteTotalTimeoutMultiplier: 0,
		WriteTotalTimeoutConstant: 0,
	}
}
