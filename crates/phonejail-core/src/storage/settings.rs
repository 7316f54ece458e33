//! User settings persisted by key.
//!
//! Every write goes to the store first; the in-memory copy only changes
//! once the store accepted it. Strict-mode changes are forwarded to the
//! access gate.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::AccessController;
use crate::error::{Result, ValidationError};
use crate::personality::Personality;

const KEY_STRICT_MODE: &str = "strict_mode_enabled";
const KEY_UNBLOCK_DURATION: &str = "default_unblock_duration";
const KEY_PERSONALITY: &str = "selected_personality";
const KEY_NOTIFICATIONS: &str = "notifications_enabled";

const DEFAULT_UNBLOCK_SECS: u64 = 3600;

/// Scalar key/value persistence.
pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub strict_mode_enabled: bool,
    pub default_unblock_duration: Duration,
    pub selected_personality: Personality,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict_mode_enabled: false,
            default_unblock_duration: Duration::from_secs(DEFAULT_UNBLOCK_SECS),
            selected_personality: Personality::Strict,
            notifications_enabled: true,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unreadable setting");
            default
        }),
    }
}

impl Settings {
    fn load(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = Self::default();
        let unblock_secs = parse_or(
            KEY_UNBLOCK_DURATION,
            store.get_setting(KEY_UNBLOCK_DURATION)?,
            DEFAULT_UNBLOCK_SECS,
        );
        Ok(Self {
            strict_mode_enabled: parse_or(
                KEY_STRICT_MODE,
                store.get_setting(KEY_STRICT_MODE)?,
                defaults.strict_mode_enabled,
            ),
            // Zero is treated as unset.
            default_unblock_duration: Duration::from_secs(if unblock_secs == 0 {
                DEFAULT_UNBLOCK_SECS
            } else {
                unblock_secs
            }),
            selected_personality: parse_or(
                KEY_PERSONALITY,
                store.get_setting(KEY_PERSONALITY)?,
                defaults.selected_personality,
            ),
            notifications_enabled: parse_or(
                KEY_NOTIFICATIONS,
                store.get_setting(KEY_NOTIFICATIONS)?,
                defaults.notifications_enabled,
            ),
        })
    }
}

pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    settings: Mutex<Settings>,
    gate: AccessController,
}

impl SettingsService {
    /// Load persisted settings and publish strict mode to the gate.
    pub fn load(store: Arc<dyn SettingsStore>, gate: AccessController) -> Result<Self> {
        let settings = Settings::load(store.as_ref())?;
        gate.set_strict_mode(settings.strict_mode_enabled);
        Ok(Self {
            store,
            settings: Mutex::new(settings),
            gate,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> Settings {
        *self.lock()
    }

    pub fn is_strict_mode_enabled(&self) -> bool {
        self.lock().strict_mode_enabled
    }

    pub fn personality(&self) -> Personality {
        self.lock().selected_personality
    }

    pub fn set_strict_mode(&self, enabled: bool) -> Result<()> {
        {
            let mut settings = self.lock();
            self.store
                .set_setting(KEY_STRICT_MODE, &enabled.to_string())?;
            settings.strict_mode_enabled = enabled;
        }
        info!(enabled, "strict mode updated");
        self.gate.set_strict_mode(enabled);
        Ok(())
    }

    /// Flip strict mode and return the new value.
    pub fn toggle_strict_mode(&self) -> Result<bool> {
        let enabled = !self.is_strict_mode_enabled();
        self.set_strict_mode(enabled)?;
        Ok(enabled)
    }

    pub fn set_default_unblock_duration(&self, duration: Duration) -> Result<()> {
        if duration.as_secs() == 0 {
            return Err(ValidationError::ZeroDuration.into());
        }
        let mut settings = self.lock();
        self.store
            .set_setting(KEY_UNBLOCK_DURATION, &duration.as_secs().to_string())?;
        settings.default_unblock_duration = Duration::from_secs(duration.as_secs());
        Ok(())
    }

    pub fn set_personality(&self, personality: Personality) -> Result<()> {
        let mut settings = self.lock();
        self.store
            .set_setting(KEY_PERSONALITY, personality.as_str())?;
        settings.selected_personality = personality;
        Ok(())
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        let mut settings = self.lock();
        self.store
            .set_setting(KEY_NOTIFICATIONS, &enabled.to_string())?;
        settings.notifications_enabled = enabled;
        Ok(())
    }

    pub fn reset_to_defaults(&self) -> Result<()> {
        let defaults = Settings::default();
        {
            let mut settings = self.lock();
            self.store
                .set_setting(KEY_STRICT_MODE, &defaults.strict_mode_enabled.to_string())?;
            self.store.set_setting(
                KEY_UNBLOCK_DURATION,
                &defaults.default_unblock_duration.as_secs().to_string(),
            )?;
            self.store
                .set_setting(KEY_PERSONALITY, defaults.selected_personality.as_str())?;
            self.store.set_setting(
                KEY_NOTIFICATIONS,
                &defaults.notifications_enabled.to_string(),
            )?;
            *settings = defaults;
        }
        self.gate.set_strict_mode(defaults.strict_mode_enabled);
        Ok(())
    }
}
