//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use composite::BackendUrls;
use core_services::RetryPolicy;
use messaging::SchedulerConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address and advertised host (default: `"0.0.0.0"`)
/// - `PORT`: composite listen port (default: `7000`)
/// - `BACKEND_PORT`: embedded backend listen port (default: `7001`)
/// - `PRODUCT_SERVICE_URL`, `RECOMMENDATION_SERVICE_URL`, `REVIEW_SERVICE_URL`:
///   backend base URLs (default: the embedded backend)
/// - `FETCH_TIMEOUT_MS`: per-call read timeout (default: `2000`)
/// - `PUBLISH_TIMEOUT_MS`: per-event publish timeout (default: `1000`)
/// - `PUBLISH_THREAD_POOL_SIZE` / `PUBLISH_TASK_QUEUE_SIZE`: publish scheduler
///   sizing (default: `10` / `100`)
/// - `PARTITION_COUNT`: partitions per channel (default: `2`)
/// - `CONSUMER_MAX_ATTEMPTS` / `CONSUMER_BACKOFF_MS`: consumer retry policy
///   (default: `3` / `500`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend_port: u16,
    pub product_service_url: Option<String>,
    pub recommendation_service_url: Option<String>,
    pub review_service_url: Option<String>,
    pub fetch_timeout: Duration,
    pub publish_timeout: Duration,
    pub publish_thread_pool_size: usize,
    pub publish_task_queue_size: usize,
    pub partition_count: usize,
    pub consumer_max_attempts: u32,
    pub consumer_backoff: Duration,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lookup = &lookup as &dyn Fn(&str) -> Option<String>;
        let millis = |key: &str, default: Duration| {
            parsed(lookup, key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(lookup, "PORT").unwrap_or(defaults.port),
            backend_port: parsed(lookup, "BACKEND_PORT").unwrap_or(defaults.backend_port),
            product_service_url: lookup("PRODUCT_SERVICE_URL"),
            recommendation_service_url: lookup("RECOMMENDATION_SERVICE_URL"),
            review_service_url: lookup("REVIEW_SERVICE_URL"),
            fetch_timeout: millis("FETCH_TIMEOUT_MS", defaults.fetch_timeout),
            publish_timeout: millis("PUBLISH_TIMEOUT_MS", defaults.publish_timeout),
            publish_thread_pool_size: parsed(lookup, "PUBLISH_THREAD_POOL_SIZE")
                .unwrap_or(defaults.publish_thread_pool_size),
            publish_task_queue_size: parsed(lookup, "PUBLISH_TASK_QUEUE_SIZE")
                .unwrap_or(defaults.publish_task_queue_size),
            partition_count: parsed(lookup, "PARTITION_COUNT").unwrap_or(defaults.partition_count),
            consumer_max_attempts: parsed(lookup, "CONSUMER_MAX_ATTEMPTS")
                .unwrap_or(defaults.consumer_max_attempts),
            consumer_backoff: millis("CONSUMER_BACKOFF_MS", defaults.consumer_backoff),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the composite `"host:port"` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the embedded backend `"host:port"` bind address.
    pub fn backend_addr(&self) -> String {
        format!("{}:{}", self.host, self.backend_port)
    }

    /// Backend base URLs; unset ones point at the embedded backend.
    pub fn backend_urls(&self) -> BackendUrls {
        let embedded = format!("http://127.0.0.1:{}", self.backend_port);
        let or_embedded = |url: &Option<String>| url.clone().unwrap_or_else(|| embedded.clone());
        BackendUrls {
            product: or_embedded(&self.product_service_url),
            recommendation: or_embedded(&self.recommendation_service_url),
            review: or_embedded(&self.review_service_url),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            thread_pool_size: self.publish_thread_pool_size,
            task_queue_size: self.publish_task_queue_size,
            ..SchedulerConfig::default()
        }
    }

    /// Exponential backoff starting at `consumer_backoff`, doubling up to twice that.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.consumer_max_attempts,
            initial_backoff: self.consumer_backoff,
            max_backoff: self.consumer_backoff.saturating_mul(2),
            multiplier: 2.0,
        }
    }
}

fn parsed<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7000,
            backend_port: 7001,
            product_service_url: None,
            recommendation_service_url: None,
            review_service_url: None,
            fetch_timeout: Duration::from_millis(2000),
            publish_timeout: Duration::from_millis(1000),
            publish_thread_pool_size: 10,
            publish_task_queue_size: 100,
            partition_count: 2,
            consumer_max_attempts: 3,
            consumer_backoff: Duration::from_millis(500),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.backend_port, 7001);
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.publish_thread_pool_size, 10);
        assert_eq!(config.publish_task_queue_size, 100);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("FETCH_TIMEOUT_MS", "250"),
            ("PARTITION_COUNT", "4"),
            ("REVIEW_SERVICE_URL", "http://review:8080"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.partition_count, 4);

        let urls = config.backend_urls();
        assert_eq!(urls.product, "http://127.0.0.1:7001");
        assert_eq!(urls.review, "http://review:8080");
    }

    #[test]
    fn test_unparsable_values_use_defaults() {
        let config = Config::from_lookup(lookup(&[("PORT", "abc"), ("CONSUMER_MAX_ATTEMPTS", "-1")]));
        assert_eq!(config.port, 7000);
        assert_eq!(config.consumer_max_attempts, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            backend_port: 8081,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.backend_addr(), "127.0.0.1:8081");
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.thread_name, "publish-pool");
        assert_eq!(scheduler.task_queue_size, 100);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.max_backoff, Duration::from_millis(1000));
    }

    #[test]
    fn test_huge_backoff_saturates() {
        let huge = u64::MAX.to_string();
        let config = Config::from_lookup(move |key: &str| {
            (key == "CONSUMER_BACKOFF_MS").then(|| huge.clone())
        });
        assert_eq!(config.consumer_backoff, Duration::from_millis(u64::MAX));

        let policy = config.retry_policy();
        assert_eq!(policy.max_backoff, Duration::MAX);
        assert_eq!(policy.backoff(200), Duration::MAX);
    }
}
