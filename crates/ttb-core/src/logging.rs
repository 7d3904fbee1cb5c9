use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging for the bot.
///
/// Default: info for our crates, warn for everything else; `debug`
/// raises our crates to debug. `RUST_LOG` overrides both.
pub fn init(debug: bool) {
    let default = if debug {
        "warn,ttb=debug,ttb_core=debug,ttb_toggl=debug,ttb_telegram=debug"
    } else {
        "warn,ttb=info,ttb_core=info,ttb_toggl=info,ttb_telegram=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .init();
}
