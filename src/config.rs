use std::time::Duration;

/// Remote API endpoint configuration, read from the environment with
/// local-dev defaults.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("PLANK_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let timeout = std::env::var("PLANK_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self { base_url, timeout }
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_base_url() {
        let config = ApiConfig::new("http://localhost:9999");
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
