//! Connection and runtime parameters.
//!
//! The key set is fixed. A key is "set" only when it holds a non-empty
//! value.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    Host,
    User,
    Password,
    Database,
    DefaultTable,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::Host,
        ConfigKey::User,
        ConfigKey::Password,
        ConfigKey::Database,
        ConfigKey::DefaultTable,
    ];

    /// The camelCase name hosts use for this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Host => "host",
            ConfigKey::User => "user",
            ConfigKey::Password => "password",
            ConfigKey::Database => "database",
            ConfigKey::DefaultTable => "defaultTable",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ConfigKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::configuration(format!("`{s}` is not a configuration key")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigStore {
    values: BTreeMap<ConfigKey, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `key`.
    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Write `key` only if it is not already set.
    pub fn set_if_absent(&mut self, key: ConfigKey, value: impl Into<String>) {
        if !self.is_set(key) {
            self.set(key, value);
        }
    }

    /// The value of `key`; unset or empty is [`Error::Configuration`].
    pub fn get(&self, key: ConfigKey) -> Result<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::configuration(format!("`{key}` is not set")))
    }

    /// The value if set, `None` otherwise.
    pub fn get_opt(&self, key: ConfigKey) -> Option<&str> {
        self.get(key).ok()
    }

    /// True when `key` holds a non-empty value.
    pub fn is_set(&self, key: ConfigKey) -> bool {
        self.values.get(&key).is_some_and(|v| !v.is_empty())
    }
}
