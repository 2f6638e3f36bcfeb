//! Auth configuration and shared handler state.

use std::sync::Arc;
use std::time::Duration;

use crate::api::email::Mailer;

const DEFAULT_OTP_TTL_SECONDS: i64 = 8 * 60;
const DEFAULT_COOLDOWN_SECONDS: i64 = 60 * 60;
const DEFAULT_MAX_OTP_ATTEMPTS: i32 = 4;
const DEFAULT_STORE_DEADLINE_SECONDS: u64 = 8;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    otp_ttl_seconds: i64,
    cooldown_seconds: i64,
    max_otp_attempts: i32,
    store_deadline: Duration,
}

impl AuthConfig {
    /// Default policy: 8 minute challenges, 4 attempts, 1 hour lockout, and an
    /// 8 second deadline on every store call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            max_otp_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
            store_deadline: Duration::from_secs(DEFAULT_STORE_DEADLINE_SECONDS),
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.cooldown_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_max_otp_attempts(mut self, attempts: i32) -> Self {
        self.max_otp_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_store_deadline_seconds(mut self, seconds: u64) -> Self {
        self.store_deadline = Duration::from_secs(seconds.max(1));
        self
    }

    pub(super) fn otp_ttl_millis(&self) -> i64 {
        self.otp_ttl_seconds * 1000
    }

    pub(super) fn otp_ttl_minutes(&self) -> i64 {
        self.otp_ttl_seconds / 60
    }

    pub(super) fn cooldown_millis(&self) -> i64 {
        self.cooldown_seconds * 1000
    }

    pub(super) fn max_otp_attempts(&self) -> i32 {
        self.max_otp_attempts
    }

    pub(crate) fn store_deadline(&self) -> Duration {
        self.store_deadline
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    mailer: Arc<dyn Mailer>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();

        assert_eq!(config.otp_ttl_millis(), 8 * 60 * 1000);
        assert_eq!(config.otp_ttl_minutes(), 8);
        assert_eq!(config.cooldown_millis(), 60 * 60 * 1000);
        assert_eq!(config.max_otp_attempts(), 4);
        assert_eq!(config.store_deadline(), Duration::from_secs(8));

        let config = config
            .with_otp_ttl_seconds(120)
            .with_cooldown_seconds(300)
            .with_max_otp_attempts(2)
            .with_store_deadline_seconds(3);

        assert_eq!(config.otp_ttl_millis(), 120_000);
        assert_eq!(config.otp_ttl_minutes(), 2);
        assert_eq!(config.cooldown_millis(), 300_000);
        assert_eq!(config.max_otp_attempts(), 2);
        assert_eq!(config.store_deadline(), Duration::from_secs(3));
    }

    #[test]
    fn auth_config_rejects_nonsense_values() {
        let config = AuthConfig::new()
            .with_otp_ttl_seconds(0)
            .with_cooldown_seconds(-5)
            .with_max_otp_attempts(0)
            .with_store_deadline_seconds(0);

        assert_eq!(config.otp_ttl_millis(), 1000);
        assert_eq!(config.cooldown_millis(), 1000);
        assert_eq!(config.max_otp_attempts(), 1);
        assert_eq!(config.store_deadline(), Duration::from_secs(1));
    }

    #[test]
    fn auth_state_exposes_config_and_mailer() {
        let state = AuthState::new(AuthConfig::new(), Arc::new(LogMailer));
        assert_eq!(state.config().max_otp_attempts(), 4);
        let _mailer = state.mailer();
    }
}
