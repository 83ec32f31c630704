//! Command-line option parsing.

use std::env;
use std::ffi::OsStr;
use std::fmt;

use log::*;

use crate::logger;


/// The command-line options used when running `tls13ep`.
#[derive(PartialEq, Debug)]
pub struct Options {

    /// Which role to drive the handshake as, and that role's settings.
    pub command: Command,

    /// Path to append NSS-format `SSLKEYLOGFILE` lines to, if any,
    /// surfaced here rather than buried in an env var check so
    /// `--key-log-file` and `SSLKEYLOGFILE` both work.
    pub key_log_file: Option<String>,

    /// Whether to print the negotiated-parameter summary as JSON.
    pub json: bool,

    /// Whether to use terminal colours when printing the summary.
    pub use_colours: UseColours,
}

/// Which side of the handshake this invocation drives.
#[derive(PartialEq, Debug)]
pub enum Command {
    Client(ClientOptions),
    Server(ServerOptions),
}

/// Settings for `tls13ep client`.
#[derive(PartialEq, Debug)]
pub struct ClientOptions {

    /// `host:port` to open a TCP connection to.
    pub connect: String,

    /// The `server_name` extension value, and the name checked against the
    /// peer's certificate. Defaults to the host half of `connect`.
    pub server_name: Option<String>,

    /// ALPN protocol names to offer, in preference order.
    pub alpn_protocols: Vec<Vec<u8>>,

    /// Skip certificate-chain validation entirely. Interop debugging only.
    pub insecure: bool,

    /// A previously exported ticket to offer as a PSK, enabling 0-RTT
    /// resumption.
    pub ticket_file: Option<String>,

    /// 0-RTT application data to send immediately after ClientHello, when
    /// `ticket_file` is set.
    pub early_data: Option<Vec<u8>>,

    /// Plaintext application data to send once the handshake completes.
    pub send: Option<String>,

    /// `record_size_limit` to advertise to the peer.
    pub record_size_limit: Option<u16>,
}

/// Settings for `tls13ep server`.
#[derive(PartialEq, Debug)]
pub struct ServerOptions {

    /// `host:port` to accept one TCP connection on.
    pub listen: String,

    /// PEM certificate chain, leaf first.
    pub cert_file: String,

    /// PEM PKCS#8 private key matching the leaf certificate.
    pub key_file: String,

    /// ALPN protocols this server is willing to select among.
    pub alpn_protocols: Vec<Vec<u8>>,

    /// `record_size_limit` to advertise to the peer.
    pub record_size_limit: Option<u16>,

    /// Seconds to set as the lifetime of the `NewSessionTicket` issued
    /// right after the handshake completes; `0` issues none.
    pub ticket_lifetime: u32,

    /// Where known PSK identities (tickets this server previously issued)
    /// are looked up from, to accept a resumption/0-RTT attempt.
    pub ticket_store: Option<String>,

    /// Plaintext application data to reply with once the handshake (and
    /// any 0-RTT drain) completes.
    pub reply: Option<String>,
}

impl Options {

    /// Parses and interprets a set of options from the user's command-line
    /// arguments.
    #[allow(unused_results)]
    pub fn getopts<C>(args: C) -> OptionsResult
    where C: IntoIterator,
          C::Item: AsRef<OsStr>,
    {
        let mut opts = getopts::Options::new();

        // Connection options
        opts.optopt  ("",  "connect",          "Address (host:port) to connect to, for the client role", "ADDR");
        opts.optopt  ("",  "listen",            "Address (host:port) to accept one connection on, for the server role", "ADDR");
        opts.optopt  ("",  "server-name",       "server_name extension / certificate name to verify (client)", "NAME");
        opts.optmulti("",  "alpn",              "ALPN protocol to offer (client) or accept (server); repeatable", "PROTO");
        opts.optopt  ("",  "record-size-limit", "record_size_limit extension value to advertise", "BYTES");

        // Client-only options
        opts.optflag ("",  "insecure",          "Skip certificate-chain validation (client)");
        opts.optopt  ("",  "ticket-file",       "Resumption ticket to offer as a PSK (client)", "FILE");
        opts.optopt  ("",  "early-data",        "0-RTT data to send with ClientHello, requires --ticket-file", "TEXT");
        opts.optopt  ("",  "send",              "Application data to send once connected", "TEXT");

        // Server-only options
        opts.optopt  ("",  "cert",              "PEM certificate chain, leaf first (server)", "FILE");
        opts.optopt  ("",  "key",                "PEM PKCS#8 private key matching --cert (server)", "FILE");
        opts.optopt  ("",  "ticket-lifetime",    "Seconds NewSessionTicket stays valid, 0 to disable (server)", "SECONDS");
        opts.optopt  ("",  "ticket-store",       "Known PSK identities to accept resumption/0-RTT from (server)", "FILE");
        opts.optopt  ("",  "reply",              "Application data to reply with once connected (server)", "TEXT");

        // Output options
        opts.optopt  ("",  "color",             "When to use terminal colors",  "WHEN");
        opts.optopt  ("",  "colour",             "When to use terminal colours", "WHEN");
        opts.optflag ("J", "json",               "Display the negotiated-parameter summary as JSON");
        opts.optopt  ("",  "key-log-file",        "Append NSS-format SSLKEYLOGFILE lines here", "FILE");

        // Meta options
        opts.optflag ("V", "version",           "Print version information");
        opts.optflagmulti ("v", "",             "Increase verbosity by adding multiple (-vv)");
        opts.optflag ("?", "help",              "Print list of command-line options");

        let matches = match opts.parse(args) {
            Ok(m)  => m,
            Err(e) => return OptionsResult::InvalidOptionsFormat(e),
        };

        let uc = UseColours::deduce(&matches);

        match matches.opt_count("v") {
            0 => (),
            1 => logger::configure(Some("debug")),
            _ => logger::configure(Some("trace")),
        }

        if matches.opt_present("version") {
            OptionsResult::Version(uc)
        }
        else if matches.opt_present("help") {
            OptionsResult::Help(HelpReason::Flag, uc)
        }
        else if matches.free.is_empty() && !matches.opt_present("connect") && !matches.opt_present("listen") {
            OptionsResult::Help(HelpReason::NoCommand, uc)
        }
        else {
            match Self::deduce(matches, uc) {
                Ok(opts) => OptionsResult::Ok(opts),
                Err(e)   => OptionsResult::InvalidOptions(e),
            }
        }
    }

    fn deduce(matches: getopts::Matches, use_colours: UseColours) -> Result<Self, OptionsError> {
        let role = matches.free.first().map(String::as_str);
        let alpn_protocols = matches.opt_strs("alpn").into_iter().map(String::into_bytes).collect::<Vec<_>>();
        let record_size_limit = Self::parse_record_size_limit(&matches)?;

        let wants_server = role == Some("server") || (role.is_none() && matches.opt_present("listen"));
        let wants_client = !wants_server && (role == Some("client") || role.is_none());

        let command = if let Some(other) = role.filter(|r| *r != "client" && *r != "server") {
            return Err(OptionsError::UnknownCommand(other.into()));
        } else if wants_server {
            Command::Server(ServerOptions {
                listen: matches.opt_str("listen").ok_or(OptionsError::MissingListenAddress)?,
                cert_file: matches.opt_str("cert").ok_or(OptionsError::MissingCertificate)?,
                key_file: matches.opt_str("key").ok_or(OptionsError::MissingPrivateKey)?,
                alpn_protocols,
                record_size_limit,
                ticket_lifetime: Self::parse_ticket_lifetime(&matches)?,
                ticket_store: matches.opt_str("ticket-store"),
                reply: matches.opt_str("reply"),
            })
        } else if wants_client {
            Command::Client(ClientOptions {
                connect: matches.opt_str("connect").ok_or(OptionsError::MissingConnectAddress)?,
                server_name: matches.opt_str("server-name"),
                alpn_protocols,
                insecure: matches.opt_present("insecure"),
                ticket_file: matches.opt_str("ticket-file"),
                early_data: matches.opt_str("early-data").map(String::into_bytes),
                send: matches.opt_str("send"),
                record_size_limit,
            })
        } else {
            return Err(OptionsError::MissingConnectAddress);
        };

        let json = matches.opt_present("json");
        let key_log_file = matches.opt_str("key-log-file").or_else(|| env::var("SSLKEYLOGFILE").ok());

        Ok(Self { command, key_log_file, json, use_colours })
    }

    fn parse_record_size_limit(matches: &getopts::Matches) -> Result<Option<u16>, OptionsError> {
        match matches.opt_str("record-size-limit") {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| OptionsError::InvalidRecordSizeLimit(value)),
        }
    }

    fn parse_ticket_lifetime(matches: &getopts::Matches) -> Result<u32, OptionsError> {
        match matches.opt_str("ticket-lifetime") {
            None => Ok(7200),
            Some(value) => value.parse().map_err(|_| OptionsError::InvalidTicketLifetime(value)),
        }
    }
}


/// The result of parsing the command-line options.
#[derive(Debug)]
pub enum OptionsResult {

    /// The options were parsed successfully.
    Ok(Options),

    /// There was an error (from `getopts`) parsing the arguments.
    InvalidOptionsFormat(getopts::Fail),

    /// There was an error with the combination of options the user selected.
    InvalidOptions(OptionsError),

    /// Can't run any checks because there's help to display!
    Help(HelpReason, UseColours),

    /// One of the arguments was `--version`, to display the version number.
    Version(UseColours),
}

/// The reason help is being displayed. If it's for the `--help` flag, then
/// we shouldn't return an error exit status.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum HelpReason {

    /// Help was requested with the `--help` flag.
    Flag,

    /// Neither `client`/`--connect` nor `server`/`--listen` was given.
    NoCommand,
}

/// Something wrong with the combination of options the user has picked.
#[derive(PartialEq, Debug)]
pub enum OptionsError {
    UnknownCommand(String),
    MissingConnectAddress,
    MissingListenAddress,
    MissingCertificate,
    MissingPrivateKey,
    InvalidRecordSizeLimit(String),
    InvalidTicketLifetime(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(cmd)          => write!(f, "Unknown command {cmd:?} (expected \"client\" or \"server\")"),
            Self::MissingConnectAddress        => write!(f, "Missing --connect ADDR for the client role"),
            Self::MissingListenAddress         => write!(f, "Missing --listen ADDR for the server role"),
            Self::MissingCertificate           => write!(f, "Missing --cert FILE for the server role"),
            Self::MissingPrivateKey            => write!(f, "Missing --key FILE for the server role"),
            Self::InvalidRecordSizeLimit(v)    => write!(f, "Invalid --record-size-limit value {v:?}"),
            Self::InvalidTicketLifetime(v)     => write!(f, "Invalid --ticket-lifetime value {v:?}"),
        }
    }
}


/// When to use colours in the output.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum UseColours {

    /// Always use colours.
    Always,

    /// Use colours if output is to a terminal; otherwise, do not.
    Automatic,

    /// Never use colours.
    Never,
}

impl UseColours {

    /// Works out which setting was requested from the `--color`/`--colour`
    /// flag, defaulting to automatic detection.
    pub fn deduce(matches: &getopts::Matches) -> Self {
        match matches.opt_str("color").or_else(|| matches.opt_str("colour")).as_deref() {
            Some("always") => Self::Always,
            Some("never")  => Self::Never,
            _              => Self::Automatic,
        }
    }

    /// Whether we should use colours or not. This checks whether the user
    /// has overridden the colour setting, and if not, whether output is to
    /// a terminal.
    pub fn should_use_colours(self) -> bool {
        self == Self::Always || (atty::is(atty::Stream::Stdout) && env::var("NO_COLOR").is_err() && self != Self::Never)
    }

    /// Creates a palette of colours depending on the user's wishes or
    /// whether output is to a terminal.
    pub fn palette(self) -> crate::colours::Colours {
        if self.should_use_colours() {
            crate::colours::Colours::pretty()
        }
        else {
            crate::colours::Colours::plain()
        }
    }
}
