//! The COMM entry points we resolve out of `kernel32.dll` at runtime.
//!
//! The library is loaded at most once per process, the first time any port
//! is opened, and is never freed.

use crate::errors::ResourceError;
use once_cell::sync::OnceCell;
use std::io::Error as IoError;
use windows::{
	core::{s, PCSTR},
	Win32::{
		Devices::Communication::{COMMTIMEOUTS, DCB},
		Foundation::{BOOL, HANDLE, HMODULE},
		System::LibraryLoader::{GetProcAddress, LoadLibraryA},
	},
};

type SetupCommFn = unsafe extern "system" fn(HANDLE, u32, u32) -> BOOL;
type PurgeCommFn = unsafe extern "system" fn(HANDLE, u32) -> BOOL;
type SetCommMaskFn = unsafe extern "system" fn(HANDLE, u32) -> BOOL;
type GetCommStateFn = unsafe extern "system" fn(HANDLE, *mut DCB) -> BOOL;
type SetCommStateFn = unsafe extern "system" fn(HANDLE, *const DCB) -> BOOL;
type SetCommTimeoutsFn = unsafe extern "system" fn(HANDLE, *const COMMTIMEOUTS) -> BOOL;

static DRIVER: OnceCell<CommDriver> = OnceCell::new();

/// Typed function pointers into the system COMM driver library.
#[derive(Clone, Copy)]
pub struct CommDriver {
	setup_comm: SetupCommFn,
	purge_comm: PurgeCommFn,
	set_comm_mask: SetCommMaskFn,
	get_comm_state: GetCommStateFn,
	set_comm_state: SetCommStateFn,
	set_comm_timeouts: SetCommTimeoutsFn,
}

impl CommDriver {
	/// Get the process wide driver, loading it if this is the first call.
	///
	/// A failed load is not cached, the next call tries again.
	///
	/// ## Errors
	///
	/// If the library, or any one of the entry points cannot be found.
	pub fn get() -> Result<&'static Self, ResourceError> {
		DRIVER.get_or_try_init(Self::load)
	}

	fn load() -> Result<Self, ResourceError> {
		let library = unsafe { LoadLibraryA(s!("kernel32.dll")) }.map_err(|_| {
			ResourceError::DriverLoadFailure {
				symbol: "kernel32.dll",
				source: IoError::last_os_error(),
			}
		})?;

		// SAFETY: every symbol is transmuted to the signature documented for it
		// by the Win32 API, and the library is never unloaded.
		unsafe {
			Ok(Self {
				setup_comm: std::mem::transmute::<_, SetupCommFn>(resolve(
					library,
					s!("SetupComm"),
					"SetupComm",
				)?),
				purge_comm: std::mem::transmute::<_, PurgeCommFn>(resolve(
					library,
					s!("PurgeComm"),
					"PurgeComm",
				)?),
				set_comm_mask: std::mem::transmute::<_, SetCommMaskFn>(resolve(
					library,
					s!("SetCommMask"),
					"SetCommMask",
				)?),
				get_comm_state: std::mem::transmute::<_, GetCommStateFn>(resolve(
					library,
					s!("GetCommState"),
					"GetCommState",
				)?),
				set_comm_state: std::mem::transmute::<_, SetCommStateFn>(resolve(
					library,
					s!("SetCommState"),
					"SetCommState",
				)?),
				set_comm_timeouts: std::mem::transmute::<_, SetCommTimeoutsFn>(resolve(
					library,
					s!("SetCommTimeouts"),
					"SetCommTimeouts",
				)?),
			})
		}
	}

	/// Size the driver's receive, and transmit queues.
	pub fn setup_comm(&self, handle: HANDLE, input: u32, output: u32) -> Result<(), IoError> {
		check(unsafe { (self.setup_comm)(handle, input, output) })
	}

	/// Discard, and/or abort queued transfers.
	pub fn purge_comm(&self, handle: HANDLE, flags: u32) -> Result<(), IoError> {
		check(unsafe { (self.purge_comm)(handle, flags) })
	}

	/// Choose which events the driver will report for this handle.
	pub fn set_comm_mask(&self, handle: HANDLE, mask: u32) -> Result<(), IoError> {
		check(unsafe { (self.set_comm_mask)(handle, mask) })
	}

	/// Fill `dcb` with the driver's current line settings.
	pub fn get_comm_state(&self, handle: HANDLE, dcb: &mut DCB) -> Result<(), IoError> {
		check(unsafe { (self.get_comm_state)(handle, dcb) })
	}

	/// Hand a full set of line settings to the driver.
	pub fn set_comm_state(&self, handle: HANDLE, dcb: &DCB) -> Result<(), IoError> {
		check(unsafe { (self.set_comm_state)(handle, dcb) })
	}

	/// Hand a full set of read, and write timeouts to the driver.
	pub fn set_comm_timeouts(
		&self,
		handle: HANDLE,
		timeouts: &COMMTIMEOUTS,
	) -> Result<(), IoError> {
		check(unsafe { (self.set_comm_timeouts)(handle, timeouts) })
	}
}

unsafe fn resolve(
	library: HMODULE,
	name: PCSTR,
	symbol: &'static str,
) -> Result<unsafe extern "system" fn() -> isize, ResourceError> {
	GetProcAddress(library, name).ok_or_else(|| ResourceError::DriverLoadFailure {
		symbol,
		source: IoError::last_os_error(),
	})
}

fn check(result: BOOL) -> Result<(), IoError> {
	if result.as_bool() {
		Ok(())
	} else {
		Err(IoError::last_os_error())
	}
}
