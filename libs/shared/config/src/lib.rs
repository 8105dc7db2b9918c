use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub health_path: String,
    pub probe_timeout_ms: u64,
    pub probe_recheck_secs: u64,
    pub remote_timeout_ms: u64,
    pub data_dir: String,
    pub admin_email: String,
    pub reminder_poll_secs: u64,
    pub channel_delay_ms: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".to_string(),
            health_path: "/health".to_string(),
            probe_timeout_ms: 3000,
            probe_recheck_secs: 60,
            remote_timeout_ms: 10_000,
            data_dir: "./data".to_string(),
            admin_email: "admin@clinica.com".to_string(),
            reminder_poll_secs: 30,
            channel_delay_ms: 500,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            api_base_url: string_var("CLINIC_API_URL", defaults.api_base_url),
            health_path: string_var("CLINIC_HEALTH_PATH", defaults.health_path),
            probe_timeout_ms: parsed_var("CLINIC_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms),
            probe_recheck_secs: parsed_var("CLINIC_PROBE_RECHECK_SECS", defaults.probe_recheck_secs),
            remote_timeout_ms: parsed_var("CLINIC_REMOTE_TIMEOUT_MS", defaults.remote_timeout_ms),
            data_dir: string_var("CLINIC_DATA_DIR", defaults.data_dir),
            admin_email: string_var("CLINIC_ADMIN_EMAIL", defaults.admin_email),
            reminder_poll_secs: parsed_var("CLINIC_REMINDER_POLL_SECS", defaults.reminder_poll_secs),
            channel_delay_ms: parsed_var("CLINIC_CHANNEL_DELAY_MS", defaults.channel_delay_ms),
            port: parsed_var("CLINIC_PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Remote API not configured - running in local-only mode");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.trim().is_empty()
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), self.health_path)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// `None` keeps a negative probe verdict for the whole process lifetime.
    pub fn probe_recheck(&self) -> Option<Duration> {
        match self.probe_recheck_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn reminder_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_poll_secs.max(1))
    }

    pub fn channel_delay(&self) -> Duration {
        Duration::from_millis(self.channel_delay_ms)
    }

    pub fn is_admin(&self, email: &str) -> bool {
        !self.admin_email.is_empty() && self.admin_email.eq_ignore_ascii_case(email.trim())
    }
}

fn string_var(name: &str, default: String) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default
    })
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default", name);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_joins_base_and_path() {
        let config = AppConfig {
            api_base_url: "http://localhost:3001/api/".to_string(),
            ..AppConfig::default()
        };

        assert_eq!(config.health_url(), "http://localhost:3001/api/health");
    }

    #[test]
    fn test_zero_recheck_disables_reprobe() {
        let config = AppConfig {
            probe_recheck_secs: 0,
            ..AppConfig::default()
        };

        assert!(config.probe_recheck().is_none());
        assert_eq!(AppConfig::default().probe_recheck(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_admin_check_ignores_case_and_whitespace() {
        let config = AppConfig::default();

        assert!(config.is_admin(" Admin@Clinica.com "));
        assert!(!config.is_admin("someone@clinica.com"));
    }
}
