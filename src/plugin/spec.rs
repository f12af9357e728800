//! Plugin spec strings
//!
//! ```text
//! spec       := class_path ( ';' pair )*  |  class_path ':' value
//! class_path := segment ( '.' segment )+
//! pair       := key '=' value
//! ```
//!
//! `;key=value` is the canonical form and the only one [`PluginSpec`] renders.
//! The `:value` form is accepted on input and decoded as the single pair
//! `config=value`.

use crate::error::{DynarunError, ErrorCode, Result};
use std::fmt;

/// Key used for the value of the `path:value` form
pub const SINGLE_VALUE_KEY: &str = "config";

/// Ordered key/value configuration carried inline by a spec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginConfig {
    entries: Vec<(String, String)>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair; an existing key keeps its position and takes the new value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject keys a handler constructor does not accept
    pub fn ensure_only(&self, accepted: &[&str]) -> Result<()> {
        if let Some((key, _)) = self.entries.iter().find(|(k, _)| !accepted.contains(&k.as_str())) {
            return Err(DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!(
                    "unexpected configuration key '{}' (accepted: {})",
                    key,
                    accepted.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PluginConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = PluginConfig::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}

/// A parsed plugin spec: dotted class path plus optional inline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    class_path: String,
    config: Option<PluginConfig>,
}

impl PluginSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |message: String| DynarunError::load(ErrorCode::LOAD_INVALID_SPEC, raw, message);

        let (class_path, config) = if raw.contains(';') {
            let mut parts = raw.split(';');
            let class_path = parts.next().unwrap_or_default().trim();
            let mut config = PluginConfig::new();
            for part in parts.filter(|p| !p.trim().is_empty()) {
                let (key, value) = part
                    .split_once('=')
                    .ok_or_else(|| invalid(format!("expected key=value, found '{part}'")))?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(invalid(format!("empty key in '{part}'")));
                }
                config.insert(key, value);
            }
            (class_path, (!config.is_empty()).then_some(config))
        } else if let Some((class_path, value)) = raw.split_once(':') {
            let mut config = PluginConfig::new();
            config.insert(SINGLE_VALUE_KEY, value);
            (class_path.trim(), Some(config))
        } else {
            (raw, None)
        };

        validate_class_path(class_path).map_err(invalid)?;

        Ok(Self {
            class_path: class_path.to_string(),
            config,
        })
    }

    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    /// Everything before the last segment
    pub fn module_path(&self) -> &str {
        self.class_path
            .rsplit_once('.')
            .map(|(module, _)| module)
            .unwrap_or_default()
    }

    /// The last segment
    pub fn class_name(&self) -> &str {
        self.class_path
            .rsplit_once('.')
            .map(|(_, class)| class)
            .unwrap_or(&self.class_path)
    }

    pub fn config(&self) -> Option<&PluginConfig> {
        self.config.as_ref()
    }

    pub fn into_config(self) -> Option<PluginConfig> {
        self.config
    }

    /// Add (or replace) one configuration pair
    pub fn with_config_entry(mut self, key: &str, value: &str) -> Self {
        self.config
            .get_or_insert_with(PluginConfig::new)
            .insert(key, value);
        self
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_path)?;
        if let Some(config) = &self.config {
            for (key, value) in config.iter() {
                write!(f, ";{key}={value}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for PluginSpec {
    type Err = DynarunError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_class_path(class_path: &str) -> std::result::Result<(), String> {
    if class_path.is_empty() {
        return Err("missing class path".to_string());
    }
    let segments: Vec<&str> = class_path.split('.').collect();
    if segments.len() < 2 {
        return Err(format!(
            "'{class_path}' must be a dotted path of the form <module>.<Class>"
        ));
    }
    for segment in segments {
        let valid = !segment.is_empty()
            && !segment.starts_with(|c: char| c.is_ascii_digit())
            && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(format!("invalid path segment '{segment}' in '{class_path}'"));
        }
    }
    Ok(())
}
