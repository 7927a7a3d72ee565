use std::time::Duration;

use serde::Deserialize;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_max_attempts() -> u32 {
    3
}

fn default_base_for_backoff() -> u32 {
    2
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_concurrency() -> usize {
    8
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_retry_batch_size() -> u32 {
    100
}

/// Jitter applied to retry delays.
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// Use the computed delay as is.
    None,
    /// Pick uniformly between zero and the computed delay.
    #[default]
    Full,
}

/// Retry policy for transient channel failures.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct RetryPolicyConfig {
    /// Total send attempts per delivery, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Growth factor between consecutive retry delays.
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff", deserialize_with = "deserialize_duration_from_ms")]
    pub initial_backoff_ms: Duration,
    /// Upper bound for any retry delay.
    #[serde(default = "default_max_backoff", deserialize_with = "deserialize_duration_from_seconds")]
    pub max_backoff_secs: Duration,
    /// Randomization applied to each delay.
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            jitter: JitterSetting::default(),
        }
    }
}

impl RetryPolicyConfig {
    /// Un-jittered delay before the retry that follows the `attempts`-th
    /// failed attempt: `initial * base^(attempts - 1)`, capped at the maximum.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = self.base_for_backoff.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_secs)
    }
}

/// Dispatch fan-out settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of alerts dispatched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// How often the retry loop looks for due attempts.
    #[serde(
        default = "default_retry_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub retry_interval_secs: Duration,
    /// Maximum number of due attempts picked up per retry cycle.
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: u32,
    /// Backoff for transient channel failures.
    #[serde(default)]
    pub retry_policy: RetryPolicyConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_interval_secs: default_retry_interval(),
            retry_batch_size: default_retry_batch_size(),
            retry_policy: RetryPolicyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicyConfig {
            max_attempts: 10,
            base_for_backoff: 2,
            initial_backoff_ms: Duration::from_secs(1),
            max_backoff_secs: Duration::from_secs(10),
            jitter: JitterSetting::None,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(60), Duration::from_secs(10));
    }

    #[test]
    fn test_dispatch_config_from_yaml() {
        let yaml = r#"
          concurrency: 2
          retry_interval_secs: 5
          retry_policy:
            max_attempts: 5
            initial_backoff_ms: 250
            max_backoff_secs: 60
            jitter: none
        "#;
        let config: DispatchConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.retry_interval_secs, Duration::from_secs(5));
        assert_eq!(config.retry_batch_size, 100);
        assert_eq!(config.retry_policy.max_attempts, 5);
        assert_eq!(config.retry_policy.base_for_backoff, 2);
        assert_eq!(config.retry_policy.initial_backoff_ms, Duration::from_millis(250));
        assert_eq!(config.retry_policy.max_backoff_secs, Duration::from_secs(60));
        assert_eq!(config.retry_policy.jitter, JitterSetting::None);
    }
}
