//! Tunables for a deployment run

use std::time::Duration;

/// Region new resources are placed in unless configured otherwise
pub const DEFAULT_REGION: &str = "canadacentral";

/// Longest single wait between upload attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Upper bounds accepted by [`RetryPolicy::validate`]
const MAX_ATTEMPTS_CEILING: u32 = 100;
const MAX_GROWTH_FACTOR: f64 = 10.0;

/// Exponential backoff for the package upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Upload attempts before the fallback path is considered
    pub max_attempts: u32,
    /// Wait after the first failed attempt
    pub base_delay: Duration,
    /// Multiplier applied to the wait after each further failure
    pub growth_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(15),
            growth_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Wait following failed attempt `attempt` (1-based), or `None` when
    /// that attempt was the last one. Never longer than [`MAX_BACKOFF`].
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        if self.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.growth_factor.powi(exponent);
        Some(Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |wait| wait.min(MAX_BACKOFF)))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_CEILING {
            return Err(format!(
                "retry ceiling must be between 1 and {}, got {}",
                MAX_ATTEMPTS_CEILING, self.max_attempts
            ));
        }
        if !self.growth_factor.is_finite() || !(1.0..=MAX_GROWTH_FACTOR).contains(&self.growth_factor) {
            return Err(format!(
                "backoff growth factor must be between 1.0 and {}, got {}",
                MAX_GROWTH_FACTOR, self.growth_factor
            ));
        }
        if self.base_delay > MAX_BACKOFF {
            return Err(format!(
                "base backoff delay must be at most {}s, got {}s",
                MAX_BACKOFF.as_secs(),
                self.base_delay.as_secs_f64()
            ));
        }
        Ok(())
    }
}

/// Everything the orchestrator needs besides its clients
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    pub region: String,
    /// Subscription to use instead of the first one the account lists
    pub subscription_override: Option<String>,
    pub retry: RetryPolicy,
    /// Pause between application creation and the first upload
    pub warm_up: Duration,
    /// Pause before the verification probe
    pub settle_delay: Duration,
    pub auth_timeout: Duration,
    pub control_plane_timeout: Duration,
    pub upload_timeout: Duration,
    pub fallback_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            subscription_override: None,
            retry: RetryPolicy::default(),
            warm_up: Duration::from_secs(10),
            settle_delay: Duration::from_secs(45),
            auth_timeout: Duration::from_secs(900),
            control_plane_timeout: Duration::from_secs(120),
            upload_timeout: Duration::from_secs(180),
            fallback_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.region.trim().is_empty() {
            return Err("deployment region must not be empty".to_string());
        }
        self.retry.validate()?;
        let timeouts = [
            ("auth", self.auth_timeout),
            ("control plane", self.control_plane_timeout),
            ("upload", self.upload_timeout),
            ("fallback", self.fallback_timeout),
            ("probe", self.probe_timeout),
        ];
        for (label, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(format!("{} timeout must be greater than zero", label));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_geometrically() {
        let policy = RetryPolicy::default();
        let waits: Vec<_> = (1..=5).map(|n| policy.backoff_after(n)).collect();
        assert_eq!(
            waits,
            vec![
                Some(Duration::from_millis(15_000)),
                Some(Duration::from_millis(22_500)),
                Some(Duration::from_millis(33_750)),
                Some(Duration::from_millis(50_625)),
                None,
            ]
        );
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_after(1), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DeployConfig::default().validate().is_ok());

        let mut config = DeployConfig::default();
        config.retry.growth_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = DeployConfig::default();
        config.upload_timeout = Duration::ZERO;
        assert!(config.validate().unwrap_err().contains("upload"));

        let mut config = DeployConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = DeployConfig::default();
        config.retry.growth_factor = 1e300;
        assert!(config.validate().unwrap_err().contains("growth factor"));

        let mut config = DeployConfig::default();
        config.retry.base_delay = Duration::from_secs(u64::MAX);
        assert!(config.validate().unwrap_err().contains("base backoff"));
    }

    #[test]
    fn test_extreme_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            base_delay: Duration::from_secs(u64::MAX),
            growth_factor: 1e300,
        };
        assert_eq!(policy.backoff_after(1), Some(MAX_BACKOFF));
        assert_eq!(policy.backoff_after(40), Some(MAX_BACKOFF));
        assert_eq!(policy.backoff_after(u32::MAX - 1), Some(MAX_BACKOFF));

        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            growth_factor: f64::MAX,
        };
        assert_eq!(policy.backoff_after(2), Some(MAX_BACKOFF));
    }
}
