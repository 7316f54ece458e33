mod config;
pub mod database;
pub mod settings;

pub use config::{CompletionConfig, Config, LoggingConfig, NegotiationConfig};
pub use database::Database;
pub use settings::{Settings, SettingsService, SettingsStore};

use std::path::PathBuf;

/// Overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "PHONEJAIL_DATA_DIR";
/// `dev` selects the development profile.
pub const PROFILE_ENV: &str = "PHONEJAIL_ENV";

fn resolve_data_dir(
    explicit: Option<PathBuf>,
    home: Option<PathBuf>,
    profile: Option<&str>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    let name = match profile {
        Some("dev") => "phonejail-dev",
        _ => "phonejail",
    };
    home.unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(name)
}

/// Where the database and `config.toml` live, created on first use.
///
/// `PHONEJAIL_DATA_DIR` wins when set. Otherwise this is
/// `~/.config/phonejail`, or `~/.config/phonejail-dev` under
/// `PHONEJAIL_ENV=dev`.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let explicit = std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let profile = std::env::var(PROFILE_ENV).ok();
    let dir = resolve_data_dir(explicit, dirs::home_dir(), profile.as_deref());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
