//! The list of environment variables that influence behavior for `linecat`.

use once_cell::sync::Lazy;
use std::{
	env::{var as env_var, var_os as env_var_os},
	path::PathBuf,
};

/// Another way of configuring `linecat` to output it's logs in JSON.
///
/// Environment Variable Name: `LINECAT_OUTPUT_JSON`
/// Expected Values: ("1" or "0"), and ("true" or "false")
/// Type: Boolean
pub static USE_JSON_OUTPUT: Lazy<bool> =
	Lazy::new(|| env_var("LINECAT_OUTPUT_JSON").map_or(false, |var| var == "1" || var == "true"));

/// The serial port to use when none is passed on the command line.
///
/// Environment Variable Name: `LINECAT_SERIAL_PORT`
/// Expected Values: A device path (`/dev/ttyUSB0`), or name (`COM3`).
/// Type: [`PathBuf`].
pub static LINECAT_SERIAL_PORT: Lazy<Option<PathBuf>> =
	Lazy::new(|| env_var_os("LINECAT_SERIAL_PORT").map(PathBuf::from));
