//! Every process exit code `linecat` can produce.

/// We could not install the logging handlers.
pub const LOGGING_HANDLER_INSTALL_FAILURE: i32 = 2;
/// The command line arguments did not parse.
pub const ARGUMENT_PARSING_FAILURE: i32 = 3;
/// No serial port was given by argument, flag, or environment variable.
pub const NO_SERIAL_PORT_SPECIFIED: i32 = 4;
/// A serial port was given both as a positional argument, and as a flag.
pub const CONFLICTING_SERIAL_PORT_ARGS: i32 = 5;
/// The INI profile could not be loaded.
pub const PROFILE_LOAD_FAILURE: i32 = 6;
/// The serial port could not be opened, or configured.
pub const SERIAL_PORT_CONNECTION_FAILURE: i32 = 7;
/// Discarding the serial port's input queue failed.
pub const SERIAL_PORT_DISCARD_FAILURE: i32 = 8;
/// Reading from the serial port failed.
pub const SERIAL_PORT_READ_FAILURE: i32 = 9;
/// The line configuration would make every read return immediately.
pub const NON_BLOCKING_READ_CONFIG: i32 = 10;
