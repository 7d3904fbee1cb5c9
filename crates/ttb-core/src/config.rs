use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Continuous checking below this interval hammers the Toggl API.
pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;

const DEFAULT_DATABASE_PATH: &str = "data/sessions.json";

/// Typed configuration, derived from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Telegram bot API token.
    pub bot_token: String,
    /// Delay between two consecutive checks of the same timer.
    pub check_interval: Duration,
    /// Username shown in failure replies and allowed to run `/settings`.
    pub admin_username: Option<String>,
    /// Verbose logging; handler errors are re-raised instead of swallowed.
    pub debug: bool,
    /// Location of the persisted session store.
    pub database_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::load_from(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. `load` passes
    /// the process environment; tests pass a map.
    fn load_from(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = get("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let interval_raw = get("CHECK_INTERVAL").ok_or_else(|| {
            Error::Config("CHECK_INTERVAL environment variable is required".to_string())
        })?;
        let interval_secs = interval_raw.trim().parse::<u64>().map_err(|_| {
            Error::Config(format!(
                "CHECK_INTERVAL should be a whole number of seconds, got {interval_raw:?}"
            ))
        })?;
        let check_interval = interval_from_secs(interval_secs)?;

        let admin_username = get("ADMIN_USERNAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string());
        let debug = get("DEBUG").map(|s| parse_bool(&s)).unwrap_or(false);
        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Ok(Self {
            bot_token,
            check_interval,
            admin_username,
            debug,
            database_path,
        })
    }
}

fn interval_from_secs(secs: u64) -> Result<Duration> {
    if secs < MIN_CHECK_INTERVAL_SECS {
        return Err(Error::Config(format!(
            "CHECK_INTERVAL should be at least {MIN_CHECK_INTERVAL_SECS} seconds"
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
