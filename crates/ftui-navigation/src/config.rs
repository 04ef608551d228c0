#![forbid(unsafe_code)]

//! Navigation stack configuration.
//!
//! Environment overrides:
//! - `FTUI_NAV_DEBOUNCE_MS` (u64 milliseconds)
//! - `FTUI_NAV_ANIMATE` (bool)
//! - `FTUI_NAV_ANIMATE_POPS` (bool)
//! - `FTUI_NAV_REUSE_PLACEHOLDERS` (bool)

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const ENV_DEBOUNCE_MS: &str = "FTUI_NAV_DEBOUNCE_MS";
const ENV_ANIMATE: &str = "FTUI_NAV_ANIMATE";
const ENV_ANIMATE_POPS: &str = "FTUI_NAV_ANIMATE_POPS";
const ENV_REUSE_PLACEHOLDERS: &str = "FTUI_NAV_REUSE_PLACEHOLDERS";

/// Longest accepted trailing debounce.
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(10);

/// Configuration for a navigation stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Trailing delay before a count-changing path update is applied.
    /// Zero applies structural updates immediately.
    pub debounce: Duration,
    /// Animate reconciler-driven stack replacements.
    pub animate_structural: bool,
    /// Animate pops issued through the navigation stack.
    pub animate_pops: bool,
    /// Reuse a placeholder screen when the same key is still unresolved.
    pub reuse_placeholders: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(600),
            animate_structural: true,
            animate_pops: true,
            reuse_placeholders: true,
        }
    }
}

/// Parsed configuration plus every rejected override.
#[derive(Debug, Clone)]
pub struct NavigationConfigParse {
    pub config: NavigationConfig,
    pub errors: Vec<ConfigError>,
}

impl NavigationConfig {
    /// Config without debounce or animation, for headless hosts and tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            debounce: Duration::ZERO,
            animate_structural: false,
            animate_pops: false,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_animations(mut self, structural: bool, pops: bool) -> Self {
        self.animate_structural = structural;
        self.animate_pops = pops;
        self
    }

    #[must_use]
    pub fn with_placeholder_reuse(mut self, reuse: bool) -> Self {
        self.reuse_placeholders = reuse;
        self
    }

    /// Defaults overridden by the environment. Invalid values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Defaults overridden by the environment, with rejected values.
    #[must_use]
    pub fn from_env_with_diagnostics() -> NavigationConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Check constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.debounce > MAX_DEBOUNCE {
            errors.push(ConfigError::new(
                "debounce",
                format!("{}ms", self.debounce.as_millis()),
                "debounce must not exceed 10000ms",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn from_env_with<F>(mut get: F) -> NavigationConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = NavigationConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_DEBOUNCE_MS) {
        match value.trim().parse::<u64>() {
            Ok(ms) => config.debounce = Duration::from_millis(ms),
            Err(_) => errors.push(ConfigError::new(
                "debounce",
                value,
                "expected milliseconds as an unsigned integer",
            )),
        }
    }

    let bools: [(&str, &'static str, &mut bool); 3] = [
        (ENV_ANIMATE, "animate_structural", &mut config.animate_structural),
        (ENV_ANIMATE_POPS, "animate_pops", &mut config.animate_pops),
        (
            ENV_REUSE_PLACEHOLDERS,
            "reuse_placeholders",
            &mut config.reuse_placeholders,
        ),
    ];
    for (key, field, slot) in bools {
        if let Some(value) = get(key) {
            match parse_bool(&value) {
                Some(parsed) => *slot = parsed,
                None => errors.push(ConfigError::new(
                    field,
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }
    }

    if let Err(mut invalid) = config.validate() {
        config.debounce = NavigationConfig::default().debounce;
        errors.append(&mut invalid);
    }

    NavigationConfigParse { config, errors }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
