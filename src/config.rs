//! Container settings and external parameter sources.
//!
//! [`ContainerSettings`] tunes the engine (slot wait timeout, module filter) and can be
//! read from `FERROUS_RESOLVE_*` environment variables or, with the `config` feature,
//! from JSON. A [`ParameterSource`] supplies simple-typed constructor parameters by
//! name, ahead of configured dependency values.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::descriptors::AnyArc;
use crate::error::{ContainerError, DiResult};

const ENV_WAIT_TIMEOUT: &str = "FERROUS_RESOLVE_WAIT_TIMEOUT_MS";
const ENV_MODULE_PREFIXES: &str = "FERROUS_RESOLVE_MODULE_PREFIXES";

/// Engine settings.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::ContainerSettings;
/// use std::time::Duration;
///
/// let settings = ContainerSettings::new()
///     .with_wait_timeout(Duration::from_secs(5))
///     .with_module_prefix("app.");
/// assert_eq!(settings.wait_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerSettings {
    /// Upper bound for waiting on a slot another thread is building; `None` waits forever.
    pub wait_timeout_ms: Option<u64>,
    /// Only types whose module starts with one of these prefixes are discovered as
    /// implementors. Empty means every module.
    pub module_prefixes: Vec<String>,
}

impl ContainerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_module_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.module_prefixes.push(prefix.into());
        self
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Reads `FERROUS_RESOLVE_WAIT_TIMEOUT_MS` and `FERROUS_RESOLVE_MODULE_PREFIXES`
    /// (comma separated).
    pub fn from_env() -> DiResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(raw) = lookup(ENV_WAIT_TIMEOUT) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                ContainerError::Registration(format!("{}={:?}: {}", ENV_WAIT_TIMEOUT, raw, e))
            })?;
            settings.wait_timeout_ms = Some(ms);
        }
        if let Some(raw) = lookup(ENV_MODULE_PREFIXES) {
            settings.module_prefixes = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(settings)
    }

    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ContainerError::Registration(format!("invalid settings: {}", e)))
    }
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses raw text the way environment values are read: integer, float, bool, string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            ConfigValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ConfigValue::Float(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Boolean(b)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts into an instance of the named simple type.
    pub(crate) fn to_simple(&self, type_name: &str) -> Result<AnyArc, String> {
        macro_rules! int {
            ($t:ty) => {
                self.as_i64()
                    .and_then(|i| <$t>::try_from(i).ok())
                    .map(|v| Arc::new(v) as AnyArc)
            };
        }
        let converted = match type_name {
            "String" => Some(Arc::new(self.to_string()) as AnyArc),
            "bool" => self.as_bool().map(|v| Arc::new(v) as AnyArc),
            "char" => {
                let text = self.to_string();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Arc::new(c) as AnyArc),
                    _ => None,
                }
            }
            "f64" => self.as_f64().map(|v| Arc::new(v) as AnyArc),
            "f32" => self.as_f64().map(|v| Arc::new(v as f32) as AnyArc),
            "i8" => int!(i8),
            "i16" => int!(i16),
            "i32" => int!(i32),
            "i64" => int!(i64),
            "i128" => int!(i128),
            "isize" => int!(isize),
            "u8" => int!(u8),
            "u16" => int!(u16),
            "u32" => int!(u32),
            "u64" => int!(u64),
            "u128" => int!(u128),
            "usize" => int!(usize),
            _ => None,
        };
        converted.ok_or_else(|| format!("can't convert value [{}] to [{}]", self, type_name))
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

/// External source of simple-typed parameter values.
///
/// Keys are tried as `Service.parameter`, then as the bare parameter name.
pub trait ParameterSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// In-memory parameter values.
#[derive(Debug, Default, Clone)]
pub struct MapParameters {
    values: HashMap<String, ConfigValue>,
}

impl MapParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ParameterSource for MapParameters {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}

/// Parameters read from environment variables: `Service.port` with prefix `app`
/// reads `APP_SERVICE_PORT`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentParameters {
    prefix: Option<String>,
}

impl EnvironmentParameters {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn variable(&self, key: &str) -> String {
        let key = key.replace(['.', '-'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ParameterSource for EnvironmentParameters {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable(key)).ok().map(|raw| ConfigValue::parse(&raw))
    }
}
