//! Runtime configuration read from the process environment.

use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_FORECAST_MONTHS: usize = 6;

/// Settings for the insight generator's chat-completion calls.
#[derive(Clone, Debug, PartialEq)]
pub struct InsightConfig {
    pub endpoint: String,
    pub model: String,
    /// `None` disables remote calls; insights fall back to the fixed message.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: 0.3,
            max_tokens: 600,
        }
    }
}

/// Snapshot of configuration values consumed by the dashboard.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub insight: InsightConfig,
    pub forecast_months: usize,
    /// Load the bundled sample when nothing has been uploaded.
    pub use_sample: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            insight: InsightConfig::default(),
            forecast_months: DEFAULT_FORECAST_MONTHS,
            use_sample: true,
        }
    }
}

impl DashboardConfig {
    /// Create a configuration snapshot from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = env_or(
            "SALES_DASHBOARD_LLM_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let defaults = InsightConfig::default();
        Self {
            insight: InsightConfig {
                endpoint: env_or("SALES_DASHBOARD_LLM_ENDPOINT", DEFAULT_ENDPOINT),
                model: env_or("SALES_DASHBOARD_LLM_MODEL", DEFAULT_MODEL),
                api_key: non_empty("SALES_DASHBOARD_LLM_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")),
                timeout: Duration::from_secs(timeout_secs),
                ..defaults
            },
            forecast_months: env_or(
                "SALES_DASHBOARD_FORECAST_MONTHS",
                &DEFAULT_FORECAST_MONTHS.to_string(),
            )
            .parse()
            .unwrap_or(DEFAULT_FORECAST_MONTHS),
            use_sample: !matches!(
                non_empty("SALES_DASHBOARD_NO_SAMPLE").as_deref().map(str::trim),
                Some("1") | Some("true") | Some("yes")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> DashboardConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), DashboardConfig::default());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let cfg = config(&[
            ("SALES_DASHBOARD_LLM_MODEL", "local-model"),
            ("SALES_DASHBOARD_LLM_TIMEOUT_SECS", "3"),
            ("SALES_DASHBOARD_FORECAST_MONTHS", "soon"),
            ("OPENAI_API_KEY", "sk-test"),
            ("SALES_DASHBOARD_NO_SAMPLE", "true"),
        ]);
        assert_eq!(cfg.insight.model, "local-model");
        assert_eq!(cfg.insight.timeout, Duration::from_secs(3));
        assert_eq!(cfg.insight.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.forecast_months, DEFAULT_FORECAST_MONTHS);
        assert!(!cfg.use_sample);
    }

    #[test]
    fn dashboard_key_wins_and_blank_key_is_unset() {
        let cfg = config(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("SALES_DASHBOARD_LLM_API_KEY", "sk-dashboard"),
        ]);
        assert_eq!(cfg.insight.api_key.as_deref(), Some("sk-dashboard"));

        let blank = config(&[("OPENAI_API_KEY", "  ")]);
        assert!(blank.insight.api_key.is_none());
    }
}
