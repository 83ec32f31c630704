//! Logger configuration. Verbosity requested via `-v`/`-vv` is recorded
//! here during option parsing; `init` applies it (together with
//! `TLS13EP_DEBUG`) once option parsing has finished, since `env_logger`
//! can only be installed a single time.

use std::env;

/// Records the verbosity level `-v`/`-vv` asked for, via `RUST_LOG`, for
/// [`init`] to pick up afterwards.
pub fn configure(level: Option<&str>) {
    if let Some(level) = level {
        env::set_var("RUST_LOG", level);
    }
}

/// Checks the `TLS13EP_DEBUG` environment variable and whatever
/// [`configure`] already set, then installs the one-shot `env_logger`.
pub fn init() {
    let debug_env_set = env::var_os("TLS13EP_DEBUG").map(|v| !v.is_empty()).unwrap_or(false);

    let mut builder = env_logger::Builder::new();
    if env::var_os("RUST_LOG").is_some() {
        builder.parse_filters(&env::var("RUST_LOG").unwrap_or_default());
    } else if debug_env_set {
        builder.filter(None, log::LevelFilter::Debug);
    } else {
        builder.filter(None, log::LevelFilter::Off);
    }

    let _ = builder.try_init();
}
