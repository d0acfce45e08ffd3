//! Configuration parsing for benchmark sessions
//!
//! Sessions are described in TOML: how many samples make a cycle and how many
//! cycles make a batch, the convergence threshold, which page each tab opens,
//! and how hard to retry closing tabs.

use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BenchError, Result};
use crate::runner::RetryPolicy;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sampling and convergence parameters
    #[serde(default)]
    pub session: SessionConfig,
    /// What each sample opens and how readiness is detected
    #[serde(default)]
    pub source: SourceConfig,
    /// Tab close retry policy
    #[serde(default)]
    pub teardown: TeardownConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed, or
    /// a value fails [`Config::validate`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tab_bench::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("tab-bench.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use tab_bench::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_str(r#"
    ///     [session]
    ///     num_cycles = 2
    ///     tabs_per_cycle = 3
    /// "#)?;
    /// assert_eq!(config.session.threshold, 1.0);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        if self.teardown.max_attempts == 0 {
            return Err(BenchError::InvalidConfig(
                "teardown.max_attempts must be at least 1".into(),
            ));
        }
        if self.source.ready_timeout.is_zero() {
            return Err(BenchError::InvalidConfig(
                "source.ready_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Sampling shape and stopping rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cycles per batch (default: 5)
    #[serde(default = "default_num_cycles")]
    pub num_cycles: usize,
    /// Samples per cycle (default: 10)
    #[serde(default = "default_tabs_per_cycle")]
    pub tabs_per_cycle: usize,
    /// All three pairwise statistics must fall strictly below this value
    /// (default: 1.0). A sensitivity knob, not a p-value.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Converged rounds needed to end the session (default: 1)
    #[serde(default = "default_target_converged_count")]
    pub target_converged_count: u32,
    /// Give up with `NonConvergent` after this many iterations
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// Failed iterations tolerated in a row before the session ends (default: 3)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_num_cycles() -> usize {
    5
}

fn default_tabs_per_cycle() -> usize {
    10
}

fn default_threshold() -> f64 {
    1.0
}

fn default_target_converged_count() -> u32 {
    1
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            num_cycles: default_num_cycles(),
            tabs_per_cycle: default_tabs_per_cycle(),
            threshold: default_threshold(),
            target_converged_count: default_target_converged_count(),
            max_iterations: None,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_cycles == 0 {
            return Err(BenchError::InvalidConfig("num_cycles must be at least 1".into()));
        }
        if self.tabs_per_cycle == 0 {
            return Err(BenchError::InvalidConfig(
                "tabs_per_cycle must be at least 1".into(),
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "threshold must be a positive finite number (got {})",
                self.threshold
            )));
        }
        if self.target_converged_count == 0 {
            return Err(BenchError::InvalidConfig(
                "target_converged_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Page opened by each sample and readiness polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Give up waiting for a tab after this long (default: 30s)
    #[serde(rename = "ready_timeout_ms", with = "duration_ms", default = "default_ready_timeout")]
    pub ready_timeout: Duration,
    /// Delay between readiness polls; zero polls back to back (default: 0)
    #[serde(rename = "poll_interval_ms", with = "duration_ms", default)]
    pub poll_interval: Duration,
    #[serde(default)]
    pub target: PageTarget,
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            target: PageTarget::default(),
            ready_timeout: default_ready_timeout(),
            poll_interval: Duration::ZERO,
        }
    }
}

/// What a freshly opened tab loads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageTarget {
    /// Navigate to a URL (a static page, `about:blank`, ...)
    Url { url: String },
    /// Serve inline HTML as a base64 `data:` URL
    InlineHtml { html: String },
}

impl Default for PageTarget {
    fn default() -> Self {
        PageTarget::Url {
            url: "about:blank".to_string(),
        }
    }
}

impl PageTarget {
    /// URL handed to the browser when opening a tab
    ///
    /// ```
    /// use tab_bench::config::PageTarget;
    ///
    /// let target = PageTarget::InlineHtml { html: "<p>hi</p>".into() };
    /// assert_eq!(target.to_url(), "data:text/html;base64,PHA+aGk8L3A+");
    /// ```
    pub fn to_url(&self) -> String {
        match self {
            PageTarget::Url { url } => url.clone(),
            PageTarget::InlineHtml { html } => format!(
                "data:text/html;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(html)
            ),
        }
    }
}

impl fmt::Display for PageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageTarget::Url { url } => write!(f, "{}", url),
            PageTarget::InlineHtml { html } => write!(f, "inline html ({} bytes)", html.len()),
        }
    }
}

/// Retry policy for closing tabs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Close attempts per tab before giving up (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts (default: 50ms)
    #[serde(rename = "retry_delay_ms", with = "duration_ms", default = "default_retry_delay")]
    pub retry_delay: Duration,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(50)
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl From<&TeardownConfig> for RetryPolicy {
    fn from(config: &TeardownConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            delay: config.retry_delay,
        }
    }
}

/// Serde module for serializing/deserializing Duration as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.num_cycles, 5);
        assert_eq!(config.session.tabs_per_cycle, 10);
        assert_eq!(config.session.threshold, 1.0);
        assert_eq!(config.session.target_converged_count, 1);
        assert_eq!(config.session.max_iterations, None);
        assert_eq!(config.source.target, PageTarget::default());
        assert_eq!(config.source.ready_timeout, Duration::from_secs(30));
        assert_eq!(config.teardown.max_attempts, 5);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [session]
            num_cycles = 2
            tabs_per_cycle = 3
            threshold = 0.5
            target_converged_count = 4
            max_iterations = 100
            max_consecutive_failures = 1

            [source]
            target = { type = "url", url = "http://localhost:8000/nothing.html" }
            ready_timeout_ms = 5000
            poll_interval_ms = 10

            [teardown]
            max_attempts = 8
            retry_delay_ms = 250
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.session.num_cycles, 2);
        assert_eq!(config.session.tabs_per_cycle, 3);
        assert_eq!(config.session.threshold, 0.5);
        assert_eq!(config.session.target_converged_count, 4);
        assert_eq!(config.session.max_iterations, Some(100));
        assert_eq!(config.session.max_consecutive_failures, 1);
        assert_eq!(
            config.source.target.to_url(),
            "http://localhost:8000/nothing.html"
        );
        assert_eq!(config.source.ready_timeout, Duration::from_millis(5000));
        assert_eq!(config.source.poll_interval, Duration::from_millis(10));

        let policy = RetryPolicy::from(&config.teardown);
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_inline_html_target() {
        let toml = r#"
            [source]
            target = { type = "inline_html", html = "<html></html>" }
        "#;
        let config = Config::from_str(toml).unwrap();
        assert!(config
            .source
            .target
            .to_url()
            .starts_with("data:text/html;base64,"));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(Config::from_str("[session]\nnum_cycles = 0").is_err());
        assert!(Config::from_str("[session]\ntabs_per_cycle = 0").is_err());
        assert!(Config::from_str("[session]\ntarget_converged_count = 0").is_err());
        assert!(Config::from_str("[teardown]\nmax_attempts = 0").is_err());
        assert!(Config::from_str("[source]\nready_timeout_ms = 0").is_err());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let mut session = SessionConfig::default();
        session.threshold = 0.0;
        assert!(matches!(
            session.validate(),
            Err(BenchError::InvalidConfig(_))
        ));
        session.threshold = f64::NAN;
        assert!(session.validate().is_err());
        session.threshold = f64::INFINITY;
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_bundled_config_is_valid() {
        let config = Config::from_str(include_str!("../tab-bench.toml")).unwrap();
        assert_eq!(config.session.max_iterations, Some(200));
        assert_eq!(config.source.target.to_url(), "about:blank");
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("ready_timeout_ms = 30000"));
        assert!(text.contains("retry_delay_ms = 50"));
        let reparsed = Config::from_str(&text).unwrap();
        assert_eq!(reparsed.session, config.session);
    }
}
