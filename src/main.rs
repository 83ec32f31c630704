//! tls13ep, a minimal TLS 1.3 (RFC 8446) client/server demonstration binary.

#![warn(deprecated_in_future)]
#![warn(future_incompatible)]
#![warn(missing_copy_implementations)]
#![warn(nonstandard_style)]
#![warn(rust_2018_compatibility)]
#![warn(rust_2018_idioms)]
#![warn(single_use_lifetimes)]
#![warn(trivial_casts, trivial_numeric_casts)]
#![warn(unused)]

#![deny(unsafe_code)]


use std::env;
use std::process::exit;

use log::*;

mod client_cmd;
mod colours;
mod connect;
mod identity;
mod keylogfile;
mod logger;
mod server_cmd;
mod summary;
mod tickets;

mod options;
use self::options::*;

use self::summary::Summary;


/// Parses the command-line options, dispatches to the client or server
/// role, and translates the outcome into a process exit code.
fn main() {
    match Options::getopts(env::args_os().skip(1)) {
        OptionsResult::Ok(options) => {
            logger::init();
            info!("Running with options -> {:#?}", options);
            exit(run(options));
        }

        OptionsResult::Help(help_reason, _use_colours) => {
            print_help();

            if help_reason == HelpReason::NoCommand {
                exit(exits::OPTIONS_ERROR);
            }
            else {
                exit(exits::SUCCESS);
            }
        }

        OptionsResult::Version(_use_colours) => {
            println!("tls13ep {}", env!("CARGO_PKG_VERSION"));
            exit(exits::SUCCESS);
        }

        OptionsResult::InvalidOptionsFormat(fail) => {
            eprintln!("Invalid options: {fail}");
            exit(exits::OPTIONS_ERROR);
        }

        OptionsResult::InvalidOptions(why) => {
            eprintln!("{why}");
            exit(exits::OPTIONS_ERROR);
        }
    }
}

/// Runs the requested role to completion and prints its summary,
/// returning the process exit code.
fn run(options: Options) -> i32 {
    let colours = options.use_colours.palette();
    let key_log_file = options.key_log_file.as_deref();

    let outcome = match &options.command {
        Command::Client(client_options) => client_cmd::run(client_options, key_log_file).map(|o| Summary {
            negotiated: &o.negotiated,
            early_data_accepted: o.early_data_accepted,
            ticket_issued: o.new_tickets > 0,
            reply: o.reply.as_deref(),
        }),
        Command::Server(server_options) => server_cmd::run(server_options, key_log_file).map(|o| Summary {
            negotiated: &o.negotiated,
            early_data_accepted: !o.early_data.is_empty(),
            ticket_issued: o.issued_ticket.is_some(),
            reply: None,
        }),
    };

    match outcome {
        Ok(summary) => {
            summary.print(options.json, &colours);
            exits::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", colours.error.paint("error:"), e);
            exits::HANDSHAKE_ERROR
        }
    }
}

fn print_help() {
    print!("{}", include_str!("usage.txt"));
}


mod exits {
    #![allow(unused)]

    /// Exit code for when everything turns out OK.
    pub const SUCCESS: i32 = 0;

    /// Exit code for when the handshake or connection failed.
    pub const HANDSHAKE_ERROR: i32 = 1;

    /// Exit code for when the command-line options are invalid.
    pub const OPTIONS_ERROR: i32 = 3;
}
