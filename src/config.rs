//! Runtime configuration.
//!
//! Defaults reproduce the reference deployment: a Ray Session control
//! program, the `getwindidby*` window tools and the `switchto` helper,
//! refreshed every five seconds.

use std::time::Duration;

/// Default reconciliation period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Token substituted for a trailing instance number when looking up a
/// client by name (`synth7` → `synthxxx-PID-xxx`).
pub const DEFAULT_PID_PLACEHOLDER: &str = "xxx-PID-xxx";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("refresh interval must be greater than zero")]
    ZeroInterval,
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Period between two reconciliation cycles.
    pub refresh_interval: Duration,
    /// Session-manager control program.
    pub control_program: String,
    /// Window lookup tool keyed by pid.
    pub pid_window_program: String,
    /// Window lookup tool keyed by title regex.
    pub title_window_program: String,
    /// Switch-to-or-launch tool.
    pub switch_program: String,
    /// Title prefix of the session manager's own window
    /// (`"<label> - <session>"`).
    pub session_manager_label: String,
    pub pid_placeholder: String,
    /// Separator of the `jacknames` custom data list.
    pub jack_name_separator: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            control_program: "ray_control".to_string(),
            pid_window_program: "getwindidbypid".to_string(),
            title_window_program: "getwindidbyregexp".to_string(),
            switch_program: "switchto".to_string(),
            session_manager_label: "RaySession".to_string(),
            pid_placeholder: DEFAULT_PID_PLACEHOLDER.to_string(),
            jack_name_separator: ';',
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        let programs = [
            ("control_program", &self.control_program),
            ("pid_window_program", &self.pid_window_program),
            ("title_window_program", &self.title_window_program),
            ("switch_program", &self.switch_program),
            ("pid_placeholder", &self.pid_placeholder),
        ];
        for (field, value) in programs {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { field });
            }
        }
        Ok(())
    }
}
