//! POSIX serial ports driven through termios.
//!
//! The native control block is a plain `termios` that we build from scratch
//! (we never inherit whatever state the device was left in), and commit with
//! `tcsetattr`.

use crate::{
	config::{
		Config, DATA_BITS_5, DATA_BITS_6, DATA_BITS_7, DATA_BITS_8, DATA_BITS_DEFAULT,
		PARITY_DEFAULT, PARITY_EVEN, PARITY_NONE, PARITY_ODD, STOP_BITS_DEFAULT, STOP_BITS_ONE,
		STOP_BITS_TWO,
	},
	errors::{ConfigError, ResourceError, SerialError},
	Serial,
};
use libc::{O_NOCTTY, O_NONBLOCK};
use std::{
	fmt::{Debug, Formatter, Result as FmtResult},
	fs::{File, OpenOptions},
	io::{Error as IoError, Result as IoResult},
	os::unix::{
		fs::OpenOptionsExt,
		io::{AsRawFd, IntoRawFd},
	},
	path::Path,
	time::Duration,
};
use tracing::{debug, trace};

pub type RawTermios = libc::termios;

/// The smallest non-zero `VTIME` we will ever produce, in deciseconds.
const MIN_VTIME: u8 = 0x01;
/// The largest `VTIME` the field can hold, in deciseconds.
const MAX_VTIME: u8 = 0xFF;

/// Every baud rate we have a symbolic speed code for.
#[cfg(any(target_os = "linux", target_os = "android"))]
const BAUD_TABLE: &[(u32, libc::speed_t)] = &[
	(50, libc::B50),
	(75, libc::B75),
	(110, libc::B110),
	(134, libc::B134),
	(150, libc::B150),
	(200, libc::B200),
	(300, libc::B300),
	(600, libc::B600),
	(1200, libc::B1200),
	(1800, libc::B1800),
	(2400, libc::B2400),
	(4800, libc::B4800),
	(9600, libc::B9600),
	(19200, libc::B19200),
	(38400, libc::B38400),
	(57600, libc::B57600),
	(115_200, libc::B115200),
	(230_400, libc::B230400),
	(460_800, libc::B460800),
	(500_000, libc::B500000),
	(576_000, libc::B576000),
	(921_600, libc::B921600),
	(1_000_000, libc::B1000000),
	(1_152_000, libc::B1152000),
	(1_500_000, libc::B1500000),
	(2_000_000, libc::B2000000),
	(2_500_000, libc::B2500000),
	(3_000_000, libc::B3000000),
	(3_500_000, libc::B3500000),
	(4_000_000, libc::B4000000),
];
/// Every baud rate we have a symbolic speed code for.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const BAUD_TABLE: &[(u32, libc::speed_t)] = &[
	(50, libc::B50),
	(75, libc::B75),
	(110, libc::B110),
	(134, libc::B134),
	(150, libc::B150),
	(200, libc::B200),
	(300, libc::B300),
	(600, libc::B600),
	(1200, libc::B1200),
	(1800, libc::B1800),
	(2400, libc::B2400),
	(4800, libc::B4800),
	(9600, libc::B9600),
	(19200, libc::B19200),
	(38400, libc::B38400),
	(57600, libc::B57600),
	(115_200, libc::B115200),
	(230_400, libc::B230400),
];

/// A serial port backed by a TTY file descriptor.
pub struct TtyPort {
	/// `None` once the port has been closed.
	fd: Option<File>,
	/// The native control block as last staged by `set_config`.
	termios: RawTermios,
	/// The configuration `termios` was translated from.
	config: Config,
}

impl TtyPort {
	fn fd(&self) -> Result<&File, SerialError> {
		self.fd.as_ref().ok_or(SerialError::PortClosed)
	}

	/// Open the device for exclusive non-blocking access, then switch the
	/// descriptor back to blocking so `VMIN`/`VTIME` govern reads.
	fn open_device(path: &Path) -> IoResult<File> {
		let fd = OpenOptions::new()
			.read(true)
			.write(true)
			.create(false)
			.custom_flags(O_NONBLOCK | O_NOCTTY)
			.open(path)?;

		unsafe {
			check(libc::flock(fd.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB))?;
			let flags = check(libc::fcntl(fd.as_raw_fd(), libc::F_GETFL))?;
			check(libc::fcntl(
				fd.as_raw_fd(),
				libc::F_SETFL,
				flags & !O_NONBLOCK,
			))?;
		}

		Ok(fd)
	}
}

impl Serial for TtyPort {
	fn open(name: &Path, config: Config) -> Result<Self, SerialError> {
		// Translate before touching the device, a bad config never opens it.
		let mut termios = fresh_termios();
		translate(&mut termios, &config)?;

		let fd = Self::open_device(name).map_err(|source| ResourceError::OpenFailure {
			path: name.to_path_buf(),
			source,
		})?;
		let mut this = Self {
			fd: Some(fd),
			termios,
			config,
		};
		// Dropping `this` on failure closes the descriptor.
		this.reapply()?;

		debug!(
			path = %name.display(),
			baud = config.baud,
			data_bits = config.data_bits,
			parity = config.parity,
			stop_bits = config.stop_bits,
			vmin = termios.c_cc[libc::VMIN],
			vtime = termios.c_cc[libc::VTIME],
			"opened tty serial port",
		);
		Ok(this)
	}

	#[allow(
		// We manually check that sign loss isn't an issue.
		clippy::cast_sign_loss,
	)]
	fn read(&self, buff: &mut [u8]) -> Result<usize, SerialError> {
		let fd = self.fd()?;

		loop {
			match unsafe {
				check_isize(libc::read(
					fd.as_raw_fd(),
					buff.as_mut_ptr().cast(),
					buff.len() as _,
				))
			} {
				Ok(size) => {
					trace!(requested = buff.len(), read = size, "tty read");
					return Ok(size as usize);
				}
				Err(cause) => {
					if cause.raw_os_error() == Some(libc::EINTR) {
						continue;
					}

					return Err(SerialError::ReadFailure(cause));
				}
			}
		}
	}

	#[allow(
		// We validate manually the sign loss isn't an issue.
		clippy::cast_sign_loss,
	)]
	fn write(&self, buff: &[u8]) -> Result<usize, SerialError> {
		let fd = self.fd()?;

		loop {
			match unsafe {
				check_isize(libc::write(
					fd.as_raw_fd(),
					buff.as_ptr().cast(),
					buff.len() as _,
				))
			} {
				Ok(size) => {
					trace!(requested = buff.len(), written = size, "tty write");
					return Ok(size as usize);
				}
				Err(cause) => {
					if cause.raw_os_error() == Some(libc::EINTR) {
						continue;
					}

					return Err(SerialError::WriteFailure(cause));
				}
			}
		}
	}

	fn discard_input(&self) -> Result<(), SerialError> {
		let fd = self.fd()?;
		unsafe { check(libc::tcflush(fd.as_raw_fd(), libc::TCIFLUSH)) }
			.map(|_| ())
			.map_err(|source| SerialError::DiscardFailure {
				direction: "input",
				source,
			})
	}

	fn discard_output(&self) -> Result<(), SerialError> {
		let fd = self.fd()?;
		unsafe { check(libc::tcflush(fd.as_raw_fd(), libc::TCOFLUSH)) }
			.map(|_| ())
			.map_err(|source| SerialError::DiscardFailure {
				direction: "output",
				source,
			})
	}

	fn close(&mut self) -> Result<(), SerialError> {
		let Some(fd) = self.fd.take() else {
			return Ok(());
		};

		if unsafe { libc::close(fd.into_raw_fd()) } == -1 {
			let cause = IoError::last_os_error();
			if cause.raw_os_error() != Some(libc::EBADF) {
				return Err(SerialError::CloseFailure(cause));
			}
		}

		debug!("closed tty serial port");
		Ok(())
	}

	fn set_config(&mut self, config: Config) -> Result<(), SerialError> {
		self.fd()?;

		let mut staged = self.termios;
		translate(&mut staged, &config)?;
		self.termios = staged;
		self.config = config;

		debug!(
			baud = config.baud,
			data_bits = config.data_bits,
			parity = config.parity,
			stop_bits = config.stop_bits,
			vmin = staged.c_cc[libc::VMIN],
			vtime = staged.c_cc[libc::VTIME],
			"staged tty configuration",
		);
		Ok(())
	}

	fn reapply(&mut self) -> Result<(), SerialError> {
		let fd = self.fd()?;
		unsafe { check(libc::tcsetattr(fd.as_raw_fd(), libc::TCSANOW, &self.termios)) }
			.map_err(ResourceError::CommitFailure)?;

		debug!(cflag = self.termios.c_cflag, "committed tty configuration");
		Ok(())
	}

	fn config(&self) -> Config {
		self.config
	}
}

impl Debug for TtyPort {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
		fmt.debug_struct("TtyPort")
			.field("fd", &self.fd)
			.field("c_iflag", &self.termios.c_iflag)
			.field("c_cflag", &self.termios.c_cflag)
			.field("vmin", &self.termios.c_cc[libc::VMIN])
			.field("vtime", &self.termios.c_cc[libc::VTIME])
			.field("config", &self.config)
			.finish()
	}
}

/// A control block in raw binary mode: no line discipline, no echo, no
/// output processing, framing/parity errors ignored.
fn fresh_termios() -> RawTermios {
	let mut termios: RawTermios = unsafe { std::mem::zeroed() };
	termios.c_iflag = libc::IGNPAR;
	termios
}

/// Translate a full [`Config`] into `termios`.
///
/// The control flags are rebuilt from nothing every time. On failure
/// `termios` may be half written, callers translate into a copy.
fn translate(termios: &mut RawTermios, config: &Config) -> Result<(), ConfigError> {
	termios.c_cflag = libc::CREAD | libc::CLOCAL;
	encode_baud(termios, config.baud)?;
	encode_frame(termios, config)?;
	termios.c_cc[libc::VMIN] = config.min_bytes;
	termios.c_cc[libc::VTIME] = vtime_from(config.read_timeout);
	Ok(())
}

/// Find the symbolic speed code for a baud rate, no rounding.
fn lookup_baud(rate: u32) -> Option<libc::speed_t> {
	BAUD_TABLE
		.iter()
		.find_map(|&(known, code)| (known == rate).then_some(code))
}

fn encode_baud(termios: &mut RawTermios, rate: u32) -> Result<(), ConfigError> {
	let code = lookup_baud(rate).ok_or(ConfigError::UnrecognizedBaudRate(rate))?;
	unsafe {
		check(libc::cfsetispeed(termios, code))
			.and_then(|_| check(libc::cfsetospeed(termios, code)))
			.map_err(|_| ConfigError::UnrecognizedBaudRate(rate))?;
	}
	Ok(())
}

fn encode_frame(termios: &mut RawTermios, config: &Config) -> Result<(), ConfigError> {
	termios.c_cflag |= match config.data_bits {
		DATA_BITS_DEFAULT | DATA_BITS_8 => libc::CS8,
		DATA_BITS_5 => libc::CS5,
		DATA_BITS_6 => libc::CS6,
		DATA_BITS_7 => libc::CS7,
		other => return Err(ConfigError::UnsupportedDataSize(other)),
	};

	termios.c_cflag |= match config.stop_bits {
		STOP_BITS_DEFAULT | STOP_BITS_ONE => 0,
		STOP_BITS_TWO => libc::CSTOPB,
		other => return Err(ConfigError::UnsupportedStopBits(other)),
	};

	termios.c_cflag |= match config.parity {
		PARITY_DEFAULT | PARITY_NONE => 0,
		PARITY_ODD => libc::PARENB | libc::PARODD,
		PARITY_EVEN => libc::PARENB,
		// Mark, and space included, termios has no portable way to say them.
		other => return Err(ConfigError::UnsupportedParity(other)),
	};

	Ok(())
}

/// Convert a read timeout into `VTIME` deciseconds.
///
/// Zero stays zero. Anything else lands in `1..=255`, a short timeout must
/// never round down into the "return immediately" meaning of zero.
fn vtime_from(timeout: Duration) -> u8 {
	if timeout.is_zero() {
		return 0;
	}

	u8::try_from(timeout.as_millis() / 100)
		.unwrap_or(MAX_VTIME)
		.max(MIN_VTIME)
}

/// Check a return code and turn it into an OS Error.
///
/// ## Errors
///
/// If the OS returns an error code that is -1.
fn check(ret: i32) -> IoResult<i32> {
	if ret == -1 {
		Err(IoError::last_os_error())
	} else {
		Ok(ret)
	}
}

/// Check a return size and turn it into an OS Error.
///
/// ## Errors
///
/// If the OS returns an error code that is -1.
fn check_isize(ret: isize) -> IoResult<isize> {
	if ret == -1 {
		Err(IoError::last_os_error())
	} else {
		Ok(ret)
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::config::{PARITY_MARK, PARITY_SPACE, STOP_BITS_HALF};

	fn translated(config: Config) -> Result<RawTermios, ConfigError> {
		let mut termios = fresh_termios();
		translate(&mut termios, &config)?;
		Ok(termios)
	}

	fn frame_bits(termios: &RawTermios) -> libc::tcflag_t {
		termios.c_cflag & (libc::CSIZE | libc::CSTOPB | libc::PARENB | libc::PARODD)
	}

	#[test]
	pub fn every_table_rate_translates() {
		for &(rate, code) in BAUD_TABLE {
			let termios = translated(Config::new(rate))
				.unwrap_or_else(|cause| panic!("Rate {rate} is in the table but failed: {cause}"));
			assert_eq!(
				unsafe { libc::cfgetospeed(&termios) },
				code,
				"Output speed for {rate} did not match the table entry!",
			);
			assert_eq!(
				unsafe { libc::cfgetispeed(&termios) },
				code,
				"Input speed for {rate} did not match the table entry!",
			);
		}
	}

	#[test]
	pub fn rates_outside_the_table_are_rejected() {
		for rate in [0, 1, 9601, 115_201, 999_999, u32::MAX] {
			assert_eq!(
				translated(Config::new(rate)).map(|_| ()),
				Err(ConfigError::UnrecognizedBaudRate(rate)),
				"Rate {rate} is not a real speed code but was accepted!",
			);
		}
	}

	#[test]
	pub fn data_bits() {
		let zero = translated(Config {
			data_bits: DATA_BITS_DEFAULT,
			..Config::new(9600)
		})
		.expect("Zero data bits must be accepted!");
		let eight = translated(Config::new(9600)).expect("Eight data bits must be accepted!");
		assert_eq!(
			zero.c_cflag, eight.c_cflag,
			"Data bits 0, and 8 should produce identical control flags!",
		);
		assert_eq!(eight.c_cflag & libc::CSIZE, libc::CS8);

		for (bits, flag) in [
			(DATA_BITS_5, libc::CS5),
			(DATA_BITS_6, libc::CS6),
			(DATA_BITS_7, libc::CS7),
		] {
			let termios = translated(Config {
				data_bits: bits,
				..Config::new(9600)
			})
			.unwrap_or_else(|_| panic!("{bits} data bits must be accepted!"));
			assert_eq!(termios.c_cflag & libc::CSIZE, flag, "Wrong CSIZE for {bits}");
		}

		for bits in [1, 4, 9, 16, 255] {
			assert_eq!(
				translated(Config {
					data_bits: bits,
					..Config::new(9600)
				})
				.map(|_| ()),
				Err(ConfigError::UnsupportedDataSize(bits)),
			);
		}
	}

	#[test]
	pub fn stop_bits() {
		let zero = translated(Config {
			stop_bits: STOP_BITS_DEFAULT,
			..Config::new(9600)
		})
		.expect("Zero stop bits must be accepted!");
		let one = translated(Config {
			stop_bits: STOP_BITS_ONE,
			..Config::new(9600)
		})
		.expect("One stop bit must be accepted!");
		let two = translated(Config {
			stop_bits: STOP_BITS_TWO,
			..Config::new(9600)
		})
		.expect("Two stop bits must be accepted!");

		assert_eq!(zero.c_cflag, one.c_cflag);
		assert_eq!(one.c_cflag & libc::CSTOPB, 0);
		assert_eq!(two.c_cflag & libc::CSTOPB, libc::CSTOPB);
		assert_ne!(one.c_cflag, two.c_cflag);

		for bits in [3, STOP_BITS_HALF, 255] {
			assert_eq!(
				translated(Config {
					stop_bits: bits,
					..Config::new(9600)
				})
				.map(|_| ()),
				Err(ConfigError::UnsupportedStopBits(bits)),
				"Stop bits {bits} has no termios equivalent but was accepted!",
			);
		}
	}

	#[test]
	pub fn parity() {
		let none = translated(Config::new(9600)).expect("No parity must be accepted!");
		let zero = translated(Config {
			parity: PARITY_DEFAULT,
			..Config::new(9600)
		})
		.expect("Zero parity must be accepted!");
		let odd = translated(Config {
			parity: PARITY_ODD,
			..Config::new(9600)
		})
		.expect("Odd parity must be accepted!");
		let even = translated(Config {
			parity: PARITY_EVEN,
			..Config::new(9600)
		})
		.expect("Even parity must be accepted!");

		assert_eq!(none.c_cflag, zero.c_cflag);
		assert_eq!(none.c_cflag & (libc::PARENB | libc::PARODD), 0);
		assert_eq!(
			odd.c_cflag & (libc::PARENB | libc::PARODD),
			libc::PARENB | libc::PARODD
		);
		assert_eq!(even.c_cflag & (libc::PARENB | libc::PARODD), libc::PARENB);

		for parity in [PARITY_MARK, PARITY_SPACE, b'n', b'X', 1] {
			assert_eq!(
				translated(Config {
					parity,
					..Config::new(9600)
				})
				.map(|_| ()),
				Err(ConfigError::UnsupportedParity(parity)),
			);
		}
	}

	#[test]
	pub fn default_config_is_explicit_8n1() {
		let implicit = translated(Config {
			baud: 9600,
			..Default::default()
		})
		.expect("An all-default config must translate!");
		let explicit = translated(Config {
			baud: 9600,
			data_bits: DATA_BITS_8,
			parity: PARITY_NONE,
			stop_bits: STOP_BITS_ONE,
			..Default::default()
		})
		.expect("An explicit 8-N-1 config must translate!");

		assert_eq!(implicit.c_cflag, explicit.c_cflag);
		assert_eq!(implicit.c_iflag, explicit.c_iflag);
		assert_eq!(implicit.c_cc, explicit.c_cc);

		let fast = translated(Config {
			baud: 115_200,
			..Default::default()
		})
		.expect("115200 baud must translate!");
		assert_eq!(frame_bits(&fast), libc::CS8, "115200 default was not 8-N-1!");
	}

	#[test]
	pub fn vtime_clamping() {
		assert_eq!(vtime_from(Duration::ZERO), 0, "Literal zero must stay zero!");
		// Anything positive but below a decisecond must not collapse to zero.
		assert_eq!(vtime_from(Duration::from_nanos(1)), MIN_VTIME);
		assert_eq!(vtime_from(Duration::from_millis(1)), MIN_VTIME);
		assert_eq!(vtime_from(Duration::from_millis(99)), MIN_VTIME);
		assert_eq!(vtime_from(Duration::from_millis(100)), 1);
		assert_eq!(vtime_from(Duration::from_millis(250)), 2);
		assert_eq!(vtime_from(Duration::from_millis(25_500)), MAX_VTIME);
		assert_eq!(vtime_from(Duration::from_secs(60)), MAX_VTIME);
		assert_eq!(vtime_from(Duration::MAX), MAX_VTIME);
	}

	#[test]
	pub fn timeout_regimes() {
		for (min_bytes, timeout, vmin, vtime) in [
			(0, Duration::ZERO, 0, 0),
			(0, Duration::from_millis(20), 0, 1),
			(0, Duration::from_millis(800), 0, 8),
			(10, Duration::ZERO, 10, 0),
			(10, Duration::from_secs(2), 10, 20),
			(255, Duration::from_secs(3600), 255, 255),
		] {
			let termios = translated(Config::new(9600).with_read_timeout(min_bytes, timeout))
				.expect("Timeouts never fail to translate!");
			assert_eq!(
				(termios.c_cc[libc::VMIN], termios.c_cc[libc::VTIME]),
				(vmin, vtime),
				"Wrong VMIN/VTIME for ({min_bytes}, {timeout:?})",
			);
		}
	}

	#[cfg(target_os = "linux")]
	mod pty {
		use super::*;
		use std::{
			ffi::CStr,
			io::{Read, Write},
			os::unix::io::FromRawFd,
			path::PathBuf,
			time::Instant,
		};

		/// Create a pseudo-terminal, returning the controlling side, and the
		/// path to the serial-like side.
		fn pty_pair() -> (File, PathBuf) {
			unsafe {
				let controller = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
				assert!(controller >= 0, "Failed to open a pseudo-terminal!");
				let controller_file = File::from_raw_fd(controller);
				assert_eq!(libc::grantpt(controller), 0);
				assert_eq!(libc::unlockpt(controller), 0);

				let mut name = [0 as libc::c_char; 128];
				assert_eq!(
					libc::ptsname_r(controller, name.as_mut_ptr(), name.len()),
					0,
					"Failed to get the pseudo-terminal's name!",
				);
				let path = PathBuf::from(
					CStr::from_ptr(name.as_ptr())
						.to_str()
						.expect("Pseudo-terminal names are ASCII!"),
				);

				(controller_file, path)
			}
		}

		fn committed(port: &TtyPort) -> RawTermios {
			let mut termios: RawTermios = unsafe { std::mem::zeroed() };
			unsafe {
				check(libc::tcgetattr(
					port.fd().expect("Port is open").as_raw_fd(),
					&mut termios,
				))
				.expect("Failed to read back the committed termios!");
			}
			termios
		}

		#[test]
		pub fn open_commits_configuration() {
			let (_controller, path) = pty_pair();
			let port = TtyPort::open(
				&path,
				Config::new(115_200).with_read_timeout(4, Duration::from_millis(500)),
			)
			.expect("Failed to open pseudo-terminal as a serial port!");

			let termios = committed(&port);
			assert_eq!(unsafe { libc::cfgetospeed(&termios) }, libc::B115200);
			assert_eq!(termios.c_cflag & libc::CSIZE, libc::CS8);
			assert_eq!(termios.c_cc[libc::VMIN], 4);
			assert_eq!(termios.c_cc[libc::VTIME], 5);
			assert_eq!(port.config().baud, 115_200);
		}

		#[test]
		pub fn set_config_stages_until_reapply() {
			let (_controller, path) = pty_pair();
			let mut port =
				TtyPort::open(&path, Config::new(115_200)).expect("Failed to open serial port!");

			port.set_config(Config::new(9600))
				.expect("Failed to stage a 9600 baud config!");
			assert_eq!(
				unsafe { libc::cfgetospeed(&committed(&port)) },
				libc::B115200,
				"`set_config` must not commit on its own!",
			);
			assert_eq!(port.config().baud, 9600);

			port.reapply().expect("Failed to commit staged config!");
			assert_eq!(unsafe { libc::cfgetospeed(&committed(&port)) }, libc::B9600);

			port.apply(Config::new(57600))
				.expect("Failed to stage, and commit a config!");
			assert_eq!(unsafe { libc::cfgetospeed(&committed(&port)) }, libc::B57600);
		}

		#[test]
		pub fn failed_set_config_keeps_previous_block() {
			let (_controller, path) = pty_pair();
			let mut port = TtyPort::open(
				&path,
				Config {
					parity: PARITY_ODD,
					..Config::new(19200)
				},
			)
			.expect("Failed to open serial port!");
			let before = (port.termios.c_cflag, port.termios.c_cc, port.config());

			// Baud is fine, parity is not, so the baud must not leak through.
			let result = port.set_config(Config {
				parity: PARITY_MARK,
				..Config::new(9600)
			});
			assert!(matches!(
				result,
				Err(SerialError::Config(ConfigError::UnsupportedParity(PARITY_MARK))),
			));
			assert_eq!(
				(port.termios.c_cflag, port.termios.c_cc, port.config()),
				before,
				"A failed `set_config` changed the held control block!",
			);
		}

		#[test]
		pub fn bad_baud_never_opens() {
			let (_controller, path) = pty_pair();
			assert!(matches!(
				TtyPort::open(&path, Config::new(999_999)),
				Err(SerialError::Config(ConfigError::UnrecognizedBaudRate(999_999))),
			));
			// Nothing holds the exclusive lock, so a real open still works.
			TtyPort::open(&path, Config::new(9600))
				.expect("Device was left locked after a failed open!");
		}

		#[test]
		pub fn open_is_exclusive() {
			let (_controller, path) = pty_pair();
			let mut first = TtyPort::open(&path, Config::new(9600)).expect("Failed first open!");
			assert!(
				matches!(
					TtyPort::open(&path, Config::new(9600)),
					Err(SerialError::Resource(ResourceError::OpenFailure { .. })),
				),
				"A second open of the same device succeeded!",
			);
			first.close().expect("Failed to close!");
			TtyPort::open(&path, Config::new(9600)).expect("Lock wasn't released on close!");
		}

		#[test]
		pub fn missing_device_is_a_resource_error() {
			assert!(matches!(
				TtyPort::open(Path::new("/dev/this-serial-port-does-not-exist"), Config::new(9600)),
				Err(SerialError::Resource(ResourceError::OpenFailure { .. })),
			));
		}

		#[test]
		pub fn close_is_idempotent() {
			let (_controller, path) = pty_pair();
			let mut port = TtyPort::open(&path, Config::new(9600)).expect("Failed to open!");
			port.close().expect("First close failed!");
			port.close().expect("Second close must also succeed!");

			let mut buff = [0_u8; 4];
			assert!(matches!(port.read(&mut buff), Err(SerialError::PortClosed)));
			assert!(matches!(port.write(b"hi"), Err(SerialError::PortClosed)));
			assert!(matches!(port.discard_input(), Err(SerialError::PortClosed)));
			assert!(matches!(port.discard_output(), Err(SerialError::PortClosed)));
			assert!(matches!(
				port.set_config(Config::new(9600)),
				Err(SerialError::PortClosed)
			));
			assert!(matches!(port.reapply(), Err(SerialError::PortClosed)));
		}

		#[test]
		pub fn bytes_flow_both_ways() {
			let (mut controller, path) = pty_pair();
			let port = TtyPort::open(
				&path,
				Config::new(115_200).with_read_timeout(4, Duration::ZERO),
			)
			.expect("Failed to open serial port!");

			assert_eq!(port.write(b"ping").expect("Failed to write!"), 4);
			let mut received = Vec::new();
			let mut buff = [0_u8; 16];
			while received.len() < 4 {
				let read = controller
					.read(&mut buff)
					.expect("Failed to read from controller!");
				received.extend_from_slice(&buff[..read]);
			}
			assert_eq!(received, b"ping");

			controller
				.write_all(b"pong")
				.expect("Failed to write from controller!");
			// VMIN=4, VTIME=0 blocks until all four bytes are here.
			let read = port.read(&mut buff).expect("Failed to read!");
			assert_eq!(&buff[..read], b"pong");
		}

		#[test]
		pub fn reads_time_out_with_zero_bytes() {
			let (_controller, path) = pty_pair();
			let port = TtyPort::open(&path, Config::new(9600)).expect("Failed to open!");
			let mut buff = [0_u8; 8];
			assert_eq!(
				port.read(&mut buff).expect("Non-blocking read failed!"),
				0,
				"VMIN=0, VTIME=0 with no data must return nothing immediately.",
			);

			let mut port = port;
			port.apply(Config::new(9600).with_read_timeout(0, Duration::from_millis(200)))
				.expect("Failed to apply a read timeout!");
			let started = Instant::now();
			assert_eq!(port.read(&mut buff).expect("Timed read failed!"), 0);
			assert!(
				started.elapsed() >= Duration::from_millis(100),
				"Read returned before its timer could have elapsed: {:?}",
				started.elapsed(),
			);
		}

		#[test]
		pub fn discard_input_drops_pending_bytes() {
			let (mut controller, path) = pty_pair();
			let port = TtyPort::open(&path, Config::new(9600)).expect("Failed to open!");

			controller
				.write_all(b"noise")
				.expect("Failed to write from controller!");
			// The pty layer hands bytes over asynchronously.
			std::thread::sleep(Duration::from_millis(100));
			port.discard_input().expect("Failed to discard input!");
			port.discard_output().expect("Failed to discard output!");

			let mut buff = [0_u8; 8];
			assert_eq!(port.read(&mut buff).expect("Read failed!"), 0);
		}

		#[test]
		pub fn std_io_traits() {
			let (mut controller, path) = pty_pair();
			let port = TtyPort::open(&path, Config::new(9600)).expect("Failed to open!");

			(&port).write_all(b"abc").expect("Failed `write_all`!");
			(&port).flush().expect("Flush never fails!");
			let mut buff = [0_u8; 3];
			controller
				.read_exact(&mut buff)
				.expect("Failed to read from controller!");
			assert_eq!(&buff, b"abc");
		}
	}
}
