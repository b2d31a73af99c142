//! Runtime configuration for the Medilink coordinator.

use serde::Deserialize;

/// Clinic-level settings.
///
/// Loaded from the `[clinic]` section of `medilink.toml` or
/// `MEDILINK_CLINIC__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ClinicConfig {
    /// Root directory of the JSON entity store.
    #[serde(default = "default_records_dir")]
    pub records_dir: String,

    /// Consultation length applied when a request does not override it.
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
}

fn default_records_dir() -> String {
    "./data/records".to_string()
}

fn default_duration_minutes() -> i64 {
    60
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            default_duration_minutes: default_duration_minutes(),
        }
    }
}
