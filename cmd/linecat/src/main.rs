#![allow(
	// I've always disliked this rule, most of the time imports are used WITHOUT
	// the module name, and the module name is only used in the top level import.
	//
	// Where this becomes significantly more helpful to read as it's out of
	// context.
	clippy::module_name_repetitions,
)]

pub mod exit_codes;
pub mod knobs;
pub mod utils;

use crate::{
	exit_codes::{
		ARGUMENT_PARSING_FAILURE, CONFLICTING_SERIAL_PORT_ARGS, LOGGING_HANDLER_INSTALL_FAILURE,
		NON_BLOCKING_READ_CONFIG, NO_SERIAL_PORT_SPECIFIED, PROFILE_LOAD_FAILURE,
		SERIAL_PORT_CONNECTION_FAILURE, SERIAL_PORT_DISCARD_FAILURE, SERIAL_PORT_READ_FAILURE,
	},
	knobs::{
		cli::CliArguments,
		env::{LINECAT_SERIAL_PORT, USE_JSON_OUTPUT},
	},
	utils::{add_context_to, hex_line, reads_never_wait},
};
use clap::Parser;
use log::install_logging_handlers;
use miette::miette;
use serial_line::{Config, Port, Serial};
use std::{
	io::{stdin, stdout, BufRead, Write},
	path::{Path, PathBuf},
	thread,
	time::Duration,
};
use tracing::{debug, error, field::valuable, info, warn};

fn main() {
	let (argv, use_json) = bootstrap_cli();

	let path = coalesce_serial_port(use_json, argv.port_flag.as_ref(), argv.port_positional.as_ref());
	let config = line_config(use_json, &argv);
	if reads_never_wait(&config) {
		if use_json {
			error!(
				id = "linecat::config::non_blocking_reads",
				min_bytes = config.min_bytes,
				read_timeout_ms = 0,
				"reads would never wait for data",
			);
		} else {
			error!(
				"\n{:?}",
				miette!(
					help = "Pass a non-zero `--read-timeout-ms`, or `--min-bytes` (or set `read_timeout_ms`, or `min_bytes` in the profile).",
					"A minimum of zero bytes with a zero read timeout makes every read return immediately.",
				),
			);
		}

		std::process::exit(NON_BLOCKING_READ_CONFIG);
	}
	let port = open_port(use_json, &path, config);

	if argv.discard_input {
		if let Err(cause) = port.discard_input() {
			if use_json {
				error!(
					id = "linecat::serial::discard_failure",
					?cause,
					port = %path.display(),
					"failed to discard the serial port's input queue",
				);
			} else {
				error!("\n{:?}", miette::Report::new(cause));
			}

			std::process::exit(SERIAL_PORT_DISCARD_FAILURE);
		}
	}

	thread::scope(|scope| {
		let port = &port;
		scope.spawn(move || forward_stdin(use_json, port));
		read_until_failure(use_json, argv.hex, &path, port);
	});
}

/// Forward every line of stdin to the serial port, until stdin closes.
fn forward_stdin(use_json: bool, port: &Port) {
	for line in stdin().lock().lines() {
		let line = match line {
			Ok(line) => line,
			Err(cause) => {
				warn!(?cause, "stdin stopped giving us lines, no longer forwarding");
				return;
			}
		};

		let mut bytes = line.into_bytes();
		bytes.push(b'\n');
		if let Err(cause) = (&*port).write_all(&bytes) {
			if use_json {
				warn!(
					id = "linecat::serial::write_failure",
					?cause,
					"failed to write to serial port, no longer forwarding stdin",
				);
			} else {
				warn!(?cause, "failed to write to serial port, no longer forwarding stdin");
			}
			return;
		}
		debug!(bytes = bytes.len(), "forwarded stdin line");
	}

	debug!("stdin closed, no longer forwarding");
}

/// Print everything the serial port sends us, exiting the process on the
/// first read failure.
fn read_until_failure(use_json: bool, hex: bool, path: &Path, port: &Port) {
	let mut buff = [0_u8; 4096];
	let mut out = stdout().lock();

	loop {
		let read = match port.read(&mut buff) {
			// Nothing arrived within the read timeout.
			Ok(0) => continue,
			Ok(read) => read,
			Err(cause) => {
				if use_json {
					error!(
						id = "linecat::serial::read_failure",
						?cause,
						port = %path.display(),
						"failed to read from the serial port",
					);
				} else {
					error!("\n{:?}", miette::Report::new(cause));
				}

				std::process::exit(SERIAL_PORT_READ_FAILURE);
			}
		};
		let data = &buff[..read];

		if use_json {
			info!(
				id = "linecat::serial::received",
				port = %path.display(),
				data = %hex_line(data),
				"received bytes from serial port",
			);
			continue;
		}

		let written = if hex {
			writeln!(out, "{}", hex_line(data))
		} else {
			out.write_all(data)
		};
		if let Err(cause) = written.and_then(|()| out.flush()) {
			warn!(?cause, "stdout is gone, cannot print received bytes");
			return;
		}
	}
}

/// Figure out which serial port the user wants.
///
/// ## Panics
///
/// If conflicting arguments are specified, or no port is specified at all.
fn coalesce_serial_port(
	use_json: bool,
	port_flag: Option<&PathBuf>,
	port_positional: Option<&PathBuf>,
) -> PathBuf {
	if port_flag.is_some() && port_positional.is_some() {
		if use_json {
			error!(
				id = "linecat::argv::conflicting_serial_port_args",
				flags.port = ?port_flag,
				args.port = ?port_positional,
				suggestions = valuable(&[
					"You only need to specify a serial port in one way, either through an argument, or a flag.",
				]),
			);
		} else {
			error!(
				"\n{:?}",
				add_context_to(
					miette!("Positional argument conflicts with flag arguments!"),
					[miette!(
						help = format!(
							"Serial Port Flag: `{port_flag:?}` / Positional Argument: `{port_positional:?}`",
						),
						"You only need to specify a serial port in one way, either through an argument, or a flag.",
					)]
					.into_iter(),
				),
			);
		}

		std::process::exit(CONFLICTING_SERIAL_PORT_ARGS);
	}

	if let Some(path) = port_flag.or(port_positional).or(LINECAT_SERIAL_PORT.as_ref()) {
		return path.clone();
	}

	if use_json {
		error!(
			id = "linecat::argv::no_serial_port",
			suggestions = valuable(&[
				"You can specify a serial port as an argument, or through the flag `--port` (aka `-p`).",
				"You can also set the environment variable `LINECAT_SERIAL_PORT`.",
			]),
			"Please specify a serial port to open.",
		);
	} else {
		error!(
			"\n{:?}",
			add_context_to(
				miette!("No serial port specified, needed a serial port to talk to."),
				[
					miette!("You can specify a serial port with the argument without a flag, or through the flag `--port` (aka `-p`)"),
					miette!("You can also set an environment variable: `LINECAT_SERIAL_PORT` if you don't want to specify arguments."),
					miette!("On windows this should be a device name like `COM1`, `COM2`, etc., everywhere else this should be a full path to a serial device like: `/dev/ttyUSB0`"),
				]
				.into_iter(),
			),
		);
	}

	std::process::exit(NO_SERIAL_PORT_SPECIFIED);
}

/// Build the line configuration from either a profile, or flags.
///
/// ## Panics
///
/// If a profile was requested, but cannot be loaded.
fn line_config(use_json: bool, argv: &CliArguments) -> Config {
	let (Some(profile), Some(section)) = (argv.profile.as_ref(), argv.section.as_ref()) else {
		return Config {
			baud: argv.baud,
			data_bits: argv.data_bits,
			parity: argv.parity,
			stop_bits: argv.stop_bits,
			..Default::default()
		}
		.with_read_timeout(argv.min_bytes, Duration::from_millis(argv.read_timeout_ms));
	};

	match Config::from_ini_file(profile, section) {
		Ok(config) => config,
		Err(cause) => {
			if use_json {
				error!(
					id = "linecat::profile::load_failure",
					?cause,
					profile = %profile.display(),
					section = %section,
					"failed to load serial profile",
				);
			} else {
				error!(
					"\n{:?}",
					miette::Report::new(cause).wrap_err(format!(
						"Failed to load section `{section}` from `{}`",
						profile.display()
					)),
				);
			}

			std::process::exit(PROFILE_LOAD_FAILURE);
		}
	}
}

/// Open, and configure the serial port.
///
/// ## Panics
///
/// If the port cannot be opened, or the configuration is refused.
fn open_port(use_json: bool, path: &Path, config: Config) -> Port {
	match serial_line::open(path, config) {
		Ok(port) => {
			if use_json {
				info!(
					id = "linecat::serial::opened",
					port = %path.display(),
					baud = config.baud,
					"opened serial port",
				);
			} else {
				info!(port = %path.display(), baud = config.baud, "opened serial port");
			}

			port
		}
		Err(cause) => {
			if use_json {
				error!(
					id = "linecat::serial::connection_failure",
					?cause,
					port = %path.display(),
					"failed to open the serial device specified",
				);
			} else {
				error!(
					"\n{:?}",
					add_context_to(
						miette::Report::new(cause),
						[
							miette!("Failed to open the specified serial device."),
							miette!(
								help = format!("Specified serial device is: {}", path.display()),
								"Check the device exists, and that no other program has it open.",
							),
						]
						.into_iter(),
					),
				);
			}

			std::process::exit(SERIAL_PORT_CONNECTION_FAILURE);
		}
	}
}

fn bootstrap_cli() -> (CliArguments, bool) {
	let args_opt = CliArguments::try_parse();

	let use_json_cli = args_opt.as_ref().map_or_else(
		|_error| {
			// Try to identify if the user is wanting to use JSON.
			std::env::args().any(|arg| arg.as_str() == "-j" || arg.as_str() == "--json")
		},
		|args| args.json,
	);
	let use_json = *USE_JSON_OUTPUT || use_json_cli;

	if let Err(cause) = install_logging_handlers(use_json) {
		// We have to use a custom panic script here, because logging isn't setup yet.
		if use_json {
			println!(
				r#"{{"id": "linecat::logging::install_failure", "inner_display_error": "{}", "message": "Failed to install the logging handlers!"}}"#,
				format!("{cause:?}").replace('"', "\\\"")
			);
		} else {
			println!("Failed to install the logging handler to setup logging:\n{cause:?}");
		}
		std::process::exit(LOGGING_HANDLER_INSTALL_FAILURE);
	}

	match args_opt {
		Ok(args) => (args, use_json),
		Err(cause) => {
			// `--help`, and `--version` come through here too.
			if !cause.use_stderr() {
				cause.exit();
			}

			if use_json {
				error!(
					id = "linecat::cli::arg_parse_failure",
					error.kind = %cause.kind(),
					error.context = ?cause.context().map(|(kind, value)| format!("{kind}: {value}")).collect::<Vec<String>>(),
					error.rendered = %cause.render(),
					"Failed parsing CLI arguments"
				);
			} else {
				error!(
					"\n{:?}",
					miette!("Failed parsing CLI arguments!").wrap_err(cause),
				);
			}

			std::process::exit(ARGUMENT_PARSING_FAILURE);
		}
	}
}
