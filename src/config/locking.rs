// ABOUTME: Lock wait configuration for the environment and service lock tiers.
// ABOUTME: Durations use humantime syntax such as "30s" or "2m".

use serde::Deserialize;
use std::time::Duration;

use crate::release::LockSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LockingConfig {
    /// How long to wait for another batch to finish validating.
    #[serde(default = "default_environment_wait", with = "humantime_serde")]
    pub environment_wait: Duration,

    /// How long to wait for a service held by a running release.
    #[serde(default, with = "humantime_serde")]
    pub service_wait: Duration,
}

fn default_environment_wait() -> Duration {
    LockSettings::default().environment_wait
}

impl Default for LockingConfig {
    fn default() -> Self {
        let settings = LockSettings::default();
        Self {
            environment_wait: settings.environment_wait,
            service_wait: settings.service_wait,
        }
    }
}

impl From<LockingConfig> for LockSettings {
    fn from(config: LockingConfig) -> Self {
        LockSettings {
            environment_wait: config.environment_wait,
            service_wait: config.service_wait,
        }
    }
}
